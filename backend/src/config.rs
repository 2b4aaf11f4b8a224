// backend/src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;

use crate::models::LeaveState;

/// Tunables recognised by the core. Every field has a default so tests can
/// start from `CoreConfig::default()`.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub report_max_date_span_days: i64,
    pub report_default_leave_state: LeaveState,
    pub report_timeout: Duration,
    pub planner_max_assignments_per_call: usize,
    /// Fixed "today" for bonus evaluation; `None` means the system date.
    pub bonus_today: Option<NaiveDate>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            report_max_date_span_days: 366,
            report_default_leave_state: LeaveState::Approved,
            report_timeout: Duration::from_secs(30),
            planner_max_assignments_per_call: 500,
            bonus_today: None,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let report_max_date_span_days =
            parse_var("GIGA_REPORT_MAX_DATE_SPAN_DAYS")?.unwrap_or(defaults.report_max_date_span_days);
        anyhow::ensure!(report_max_date_span_days > 0, "GIGA_REPORT_MAX_DATE_SPAN_DAYS must be positive");

        let report_default_leave_state = match non_empty_var("GIGA_REPORT_DEFAULT_LEAVE_STATE") {
            Some(raw) => raw
                .parse::<LeaveState>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("GIGA_REPORT_DEFAULT_LEAVE_STATE")?,
            None => defaults.report_default_leave_state,
        };

        let report_timeout = parse_var::<u64>("GIGA_REPORT_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.report_timeout);

        let planner_max_assignments_per_call =
            parse_var("GIGA_PLANNER_MAX_ASSIGNMENTS")?.unwrap_or(defaults.planner_max_assignments_per_call);

        let bonus_today = match non_empty_var("GIGA_TODAY") {
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").with_context(|| format!("GIGA_TODAY='{raw}'"))?,
            ),
            None => None,
        };

        Ok(Self {
            report_max_date_span_days,
            report_default_leave_state,
            report_timeout,
            planner_max_assignments_per_call,
            bonus_today,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}='{raw}': {e}")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.report_max_date_span_days, 366);
        assert_eq!(cfg.report_default_leave_state, LeaveState::Approved);
        assert!(cfg.bonus_today.is_none());
    }
}
