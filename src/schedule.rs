//! Symbolic schedule names and their scheduler expressions
//!
//! The mapping is a fixed table. Adding a cadence means adding a row, not
//! changing lookup code.

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};

/// Named crawl cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolicSchedule {
    Hourly,
    #[default]
    Daily,
    Weekly,
    /// Job exists but never runs on its own
    Disabled,
}

/// Scheduler expression understood by the crawl service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleExpression(String);

impl ScheduleExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

const SCHEDULE_TABLE: [(SymbolicSchedule, Option<&str>); 4] = [
    (SymbolicSchedule::Hourly, Some("cron(0 * * * ? *)")),
    (SymbolicSchedule::Daily, Some("cron(0 0 * * ? *)")),
    (SymbolicSchedule::Weekly, Some("cron(0 0 ? * SUN *)")),
    (SymbolicSchedule::Disabled, None),
];

impl SymbolicSchedule {
    /// All known schedule names, in table order
    pub const ALL: [SymbolicSchedule; 4] = [
        SymbolicSchedule::Hourly,
        SymbolicSchedule::Daily,
        SymbolicSchedule::Weekly,
        SymbolicSchedule::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolicSchedule::Hourly => "hourly",
            SymbolicSchedule::Daily => "daily",
            SymbolicSchedule::Weekly => "weekly",
            SymbolicSchedule::Disabled => "disabled",
        }
    }

    /// Scheduler expression for this cadence, `None` for `disabled`
    pub fn expression(self) -> Option<ScheduleExpression> {
        SCHEDULE_TABLE
            .iter()
            .find(|(name, _)| *name == self)
            .and_then(|(_, expr)| expr.map(|e| ScheduleExpression(e.to_string())))
    }

    /// Reverse lookup of an expression reported by the crawl service
    pub fn from_expression(expression: Option<&str>) -> Option<Self> {
        SCHEDULE_TABLE
            .iter()
            .find(|(_, expr)| *expr == expression)
            .map(|(name, _)| *name)
    }
}

impl std::str::FromStr for SymbolicSchedule {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|schedule| schedule.as_str() == wanted)
            .ok_or_else(|| {
                DiscoveryError::config(format!(
                    "Unknown schedule '{}'. Use one of: hourly, daily, weekly, disabled.",
                    s
                ))
            })
    }
}

impl std::fmt::Display for SymbolicSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a symbolic schedule name into a scheduler expression
///
/// `disabled` yields `Ok(None)`; unknown names are configuration errors.
pub fn translate(name: &str) -> DiscoveryResult<Option<ScheduleExpression>> {
    Ok(name.parse::<SymbolicSchedule>()?.expression())
}
