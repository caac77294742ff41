//! Milestone → sprint reconciliation

use super::{Services, SyncReport};
use crate::model::{ItemState, NewSprint, SourceMilestone, Sprint, SprintState};
use crate::{Result, ResultExt};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub struct MilestoneReconciler<'a> {
    services: Services<'a>,
    now: DateTime<Utc>,
}

impl<'a> MilestoneReconciler<'a> {
    pub fn new(services: Services<'a>, now: DateTime<Utc>) -> Self {
        Self { services, now }
    }

    pub async fn run(&self, report: &mut SyncReport) -> Result<()> {
        let milestones = self.decorated_milestones().await?;

        let sprints = self
            .services
            .jira
            .list_sprints()
            .await
            .context(|| "list Jira sprints")?;
        for sprint in &sprints {
            debug!(sprint = %sprint.name, state = sprint.state.as_str(), "Found Jira sprint");
        }

        for milestone in &milestones {
            // Last sprint with the title wins
            match sprints.iter().rev().find(|s| s.name == milestone.title) {
                Some(sprint) => {
                    if let Some(updated) = sprint_update(milestone, sprint, self.now) {
                        info!(
                            sprint = %updated.name,
                            state = updated.state.as_str(),
                            "Updating sprint from milestone"
                        );
                        self.update(&updated).await?;
                        report.sprints_updated += 1;
                    }
                }
                None if milestone.state.is_closed() => {
                    debug!(milestone = %milestone.title, "Closed milestone without sprint, skipping");
                }
                None => {
                    self.create(milestone, report).await?;
                }
            }
        }

        Ok(())
    }

    /// Every GitHub milestone with its ZenHub start date
    async fn decorated_milestones(&self) -> Result<Vec<SourceMilestone>> {
        let milestones = self
            .services
            .github
            .list_milestones()
            .await
            .context(|| "list GitHub milestones")?;

        let mut decorated = Vec::with_capacity(milestones.len());
        for milestone in milestones {
            debug!(milestone = %milestone.title, state = %milestone.state, "Found GitHub milestone");
            let start_date = self
                .services
                .zenhub
                .get_milestone_start_date(milestone.number)
                .await
                .context(|| format!("get start date of milestone {:?}", milestone.title))?;
            decorated.push(SourceMilestone::new(milestone, start_date));
        }
        Ok(decorated)
    }

    async fn create(&self, milestone: &SourceMilestone, report: &mut SyncReport) -> Result<()> {
        let request = NewSprint {
            name: milestone.title.clone(),
            start_date: milestone.start_date,
            end_date: milestone.due_on,
        };
        let mut sprint = self
            .services
            .jira
            .create_sprint(&request)
            .await
            .context(|| format!("create sprint {:?}", milestone.title))?;
        report.sprints_created += 1;
        info!(sprint = %sprint.name, id = sprint.id, "Created sprint");

        if is_past(milestone.start_date, self.now) && sprint.state != SprintState::Active {
            sprint.state = SprintState::Active;
            self.update(&sprint).await?;
            report.sprints_updated += 1;
            info!(sprint = %sprint.name, "Started sprint");
        }
        Ok(())
    }

    async fn update(&self, sprint: &Sprint) -> Result<()> {
        self.services
            .jira
            .update_sprint(sprint)
            .await
            .context(|| format!("update sprint {:?}", sprint.name))?;
        Ok(())
    }
}

fn is_past(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    date.is_some_and(|d| d < now)
}

/// Sprint as it should be after applying `milestone`, if anything changes
pub fn sprint_update(
    milestone: &SourceMilestone,
    sprint: &Sprint,
    now: DateTime<Utc>,
) -> Option<Sprint> {
    let mut updated = sprint.clone();

    match milestone.state {
        ItemState::Open => {
            let started = sprint.state == SprintState::Future && is_past(milestone.start_date, now);
            if sprint.state == SprintState::Closed || started {
                updated.state = SprintState::Active;
            }
        }
        ItemState::Closed => {
            if sprint.state != SprintState::Closed {
                updated.state = SprintState::Closed;
            }
        }
    }

    if milestone.start_date.is_some() && milestone.start_date != sprint.start_date {
        updated.start_date = milestone.start_date;
    }
    if milestone.due_on.is_some() && milestone.due_on != sprint.end_date {
        updated.end_date = milestone.due_on;
    }
    if milestone.closed_at.is_some() && milestone.closed_at != sprint.complete_date {
        updated.complete_date = milestone.closed_at;
    }

    (updated != *sprint).then_some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()
    }

    fn milestone(state: ItemState, start: Option<DateTime<Utc>>) -> SourceMilestone {
        SourceMilestone {
            number: 1,
            title: "Sprint 12".to_string(),
            state,
            start_date: start,
            due_on: None,
            closed_at: None,
        }
    }

    fn sprint(state: SprintState, start: Option<DateTime<Utc>>) -> Sprint {
        Sprint {
            id: 12,
            name: "Sprint 12".to_string(),
            state,
            start_date: start,
            end_date: None,
            complete_date: None,
            origin_board_id: Some(3),
        }
    }

    #[test]
    fn test_open_milestone_past_start_activates_future_sprint() {
        let updated = sprint_update(
            &milestone(ItemState::Open, Some(at(1))),
            &sprint(SprintState::Future, Some(at(1))),
            at(10),
        )
        .unwrap();
        assert_eq!(updated.state, SprintState::Active);
        assert_eq!(updated.start_date, Some(at(1)));
    }

    #[test]
    fn test_open_milestone_future_start_keeps_sprint() {
        let result = sprint_update(
            &milestone(ItemState::Open, Some(at(20))),
            &sprint(SprintState::Future, Some(at(20))),
            at(10),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_open_milestone_reopens_closed_sprint() {
        let updated = sprint_update(
            &milestone(ItemState::Open, None),
            &sprint(SprintState::Closed, None),
            at(10),
        )
        .unwrap();
        assert_eq!(updated.state, SprintState::Active);
    }

    #[test]
    fn test_closed_milestone_closes_sprint_and_copies_dates() {
        let mut closed = milestone(ItemState::Closed, Some(at(1)));
        closed.due_on = Some(at(14));
        closed.closed_at = Some(at(15));

        let updated = sprint_update(&closed, &sprint(SprintState::Active, None), at(20)).unwrap();
        assert_eq!(updated.state, SprintState::Closed);
        assert_eq!(updated.start_date, Some(at(1)));
        assert_eq!(updated.end_date, Some(at(14)));
        assert_eq!(updated.complete_date, Some(at(15)));
    }

    #[test]
    fn test_absent_milestone_dates_do_not_clear_sprint_dates() {
        let result = sprint_update(
            &milestone(ItemState::Open, None),
            &sprint(SprintState::Active, Some(at(3))),
            at(10),
        );
        assert!(result.is_none());
    }
}
