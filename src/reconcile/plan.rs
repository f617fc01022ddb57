//! Desired-vs-observed planning
//!
//! Planning is pure: it looks at what should exist and what the catalog
//! reported, and lists the calls that close the gap. Nothing is planned
//! for resources that already match, which is what makes re-runs no-ops.

use std::collections::HashMap;

use crate::catalog::{JobSnapshot, same_location};
use crate::crawler::CrawlJobSpec;

/// What one catalog namespace should contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub namespace: String,
    pub description: Option<String>,
    /// Crawl jobs in table-root order
    pub jobs: Vec<CrawlJobSpec>,
}

/// What the catalog reported for the namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    pub namespace_exists: bool,
    /// Existing jobs keyed by name; absent names do not exist
    pub jobs: HashMap<String, JobSnapshot>,
}

/// One catalog call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    CreateNamespace {
        name: String,
        description: Option<String>,
    },
    CreateJob(Box<CrawlJobSpec>),
    /// Existing job whose schedule or target drifted
    UpdateJob(Box<CrawlJobSpec>),
    /// Initial crawl of a job created in the same plan
    StartJob(String),
}

impl ReconcileAction {
    /// Job the action applies to, `None` for namespace actions
    pub fn job_name(&self) -> Option<&str> {
        match self {
            ReconcileAction::CreateNamespace { .. } => None,
            ReconcileAction::CreateJob(spec) | ReconcileAction::UpdateJob(spec) => {
                Some(spec.name())
            }
            ReconcileAction::StartJob(name) => Some(name),
        }
    }
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileAction::CreateNamespace { name, .. } => write!(f, "create namespace {}", name),
            ReconcileAction::CreateJob(spec) => write!(f, "create job {}", spec.name()),
            ReconcileAction::UpdateJob(spec) => write!(f, "update job {}", spec.name()),
            ReconcileAction::StartJob(name) => write!(f, "start job {}", name),
        }
    }
}

/// True when an existing job no longer matches its spec
pub fn drifted(spec: &CrawlJobSpec, observed: &JobSnapshot) -> bool {
    let schedule_drift =
        observed.schedule.as_deref() != spec.schedule().map(|s| s.as_str());
    let target_drift = !observed
        .target_path
        .as_deref()
        .is_some_and(|t| same_location(t, spec.target_path()));
    schedule_drift || target_drift
}

/// Calls needed to turn `observed` into `desired`, namespace first
pub fn plan(desired: &DesiredState, observed: &ObservedState) -> Vec<ReconcileAction> {
    let mut actions = Vec::new();

    if !observed.namespace_exists {
        actions.push(ReconcileAction::CreateNamespace {
            name: desired.namespace.clone(),
            description: desired.description.clone(),
        });
    }

    for spec in &desired.jobs {
        match observed.jobs.get(spec.name()) {
            None => {
                actions.push(ReconcileAction::CreateJob(Box::new(spec.clone())));
                actions.push(ReconcileAction::StartJob(spec.name().to_string()));
            }
            Some(snapshot) if drifted(spec, snapshot) => {
                actions.push(ReconcileAction::UpdateJob(Box::new(spec.clone())));
            }
            Some(_) => {}
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JobState;
    use crate::crawler::{CrawlJobConfigBuilder, CrawlerSettings};
    use crate::models::{ChainDescriptor, TableRoot};
    use crate::schedule::SymbolicSchedule;

    fn desired(schedule: Option<SymbolicSchedule>) -> DesiredState {
        let settings = CrawlerSettings::default();
        let chain = ChainDescriptor::new("btc", "v1.0/btc", "v1.0");
        let builder = CrawlJobConfigBuilder::new("bucket", &settings);
        let jobs = ["blocks", "transactions"]
            .iter()
            .map(|table| {
                let root = TableRoot::new(
                    "btc",
                    *table,
                    &format!("v1.0/btc/{}", table),
                    vec!["date".into()],
                );
                builder.build(&chain, &root, schedule).unwrap()
            })
            .collect();

        DesiredState {
            namespace: "btc".to_string(),
            description: Some("Bitcoin".to_string()),
            jobs,
        }
    }

    fn observed_matching(desired: &DesiredState) -> ObservedState {
        ObservedState {
            namespace_exists: true,
            jobs: desired
                .jobs
                .iter()
                .map(|spec| {
                    (
                        spec.name().to_string(),
                        JobSnapshot::from_spec(spec, JobState::Ready),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_plan_from_nothing() {
        let desired = desired(None);
        let actions = plan(&desired, &ObservedState::default());

        let rendered: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "create namespace btc",
                "create job btc_blocks_crawler",
                "start job btc_blocks_crawler",
                "create job btc_transactions_crawler",
                "start job btc_transactions_crawler",
            ]
        );
    }

    #[test]
    fn test_plan_matching_state_is_empty() {
        let desired = desired(None);
        let observed = observed_matching(&desired);
        assert!(plan(&desired, &observed).is_empty());
    }

    #[test]
    fn test_plan_schedule_drift_updates_without_start() {
        let desired_daily = desired(None);
        let observed = observed_matching(&desired_daily);

        let desired_hourly = desired(Some(SymbolicSchedule::Hourly));
        let actions = plan(&desired_hourly, &observed);
        assert_eq!(actions.len(), 2);
        assert!(
            actions
                .iter()
                .all(|a| matches!(a, ReconcileAction::UpdateJob(_)))
        );
    }

    #[test]
    fn test_drift_ignores_trailing_slash() {
        let desired = desired(None);
        let spec = &desired.jobs[0];
        let mut snapshot = JobSnapshot::from_spec(spec, JobState::Running);
        snapshot.target_path = Some(spec.target_path().trim_end_matches('/').to_string());
        assert!(!drifted(spec, &snapshot));

        snapshot.target_path = None;
        assert!(drifted(spec, &snapshot));
    }
}
