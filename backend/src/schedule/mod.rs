// backend/src/schedule/mod.rs

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::models::{AreaTimeParameters, LeaveState};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Entry,
    Exit,
}

impl FromStr for MarkKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" | "entrada" => Ok(Self::Entry),
            "exit" | "salida" => Ok(Self::Exit),
            other => Err(CoreError::invalid_filter(format!("unknown mark kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarkValidation {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Outside {
        window_start: NaiveTime,
        window_end: NaiveTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Widen `[start, end]` by `tolerance_min` on both sides, clamped to the day.
fn widened(start: NaiveTime, end: NaiveTime, tolerance_min: i32) -> (NaiveTime, NaiveTime) {
    let tol = Duration::minutes(i64::from(tolerance_min.max(0)));
    let (lo, wrapped) = start.overflowing_sub_signed(tol);
    let lo = if wrapped != 0 { NaiveTime::MIN } else { lo };
    let (hi, wrapped) = end.overflowing_add_signed(tol);
    let hi = if wrapped != 0 {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(end)
    } else {
        hi
    };
    (lo, hi)
}

/// The window that applies to a mark of `kind`, tolerance included.
pub fn mark_window(params: &AreaTimeParameters, kind: MarkKind) -> (NaiveTime, NaiveTime) {
    match kind {
        MarkKind::Entry => widened(params.entry_start, params.entry_end, params.entry_tolerance_min),
        MarkKind::Exit => widened(params.exit_start, params.exit_end, params.exit_tolerance_min),
    }
}

/// Parameters in force on `day`: the most recent `vigente_desde` wins.
pub fn vigente_parameters(params: &[AreaTimeParameters], day: NaiveDate) -> Option<&AreaTimeParameters> {
    params
        .iter()
        .filter(|p| p.is_vigente(day))
        .max_by_key(|p| (p.vigente_desde, p.id))
}

#[derive(Clone)]
pub struct ScheduleValidator {
    store: Arc<dyn Store>,
}

impl ScheduleValidator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn validate_mark(&self, agent_id: i64, at: NaiveDateTime, kind: MarkKind) -> CoreResult<MarkValidation> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("agent {agent_id} not found")))?;

        let params = match agent.area_id {
            Some(area_id) => self.store.time_parameters(area_id).await?,
            None => Vec::new(),
        };
        let Some(current) = vigente_parameters(&params, at.date()) else {
            debug!(agent_id, "no time parameters in force, mark accepted");
            return Ok(MarkValidation::Ok { reason: Some("no config".into()) });
        };

        let (window_start, window_end) = mark_window(current, kind);
        let t = at.time();
        if window_start <= t && t <= window_end {
            Ok(MarkValidation::Ok { reason: None })
        } else {
            Ok(MarkValidation::Outside { window_start, window_end })
        }
    }

    pub async fn check_availability(&self, agent_id: i64, date: NaiveDate) -> CoreResult<Availability> {
        let on_leave = self
            .store
            .leaves_overlapping(&[agent_id], date, date, LeaveState::Approved)
            .await?
            .iter()
            .any(|l| l.covers(date));
        if on_leave {
            return Ok(Availability::Unavailable { reason: "on leave".into() });
        }
        if self.store.has_active_guard(agent_id, date).await? {
            return Ok(Availability::Unavailable { reason: "already assigned".into() });
        }
        Ok(Availability::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Guard, GuardState, Leave};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn params(id: i64, from: &str, entry: (&str, &str), tolerance: i32) -> AreaTimeParameters {
        AreaTimeParameters {
            id,
            area_id: 1,
            vigente_desde: d(from),
            vigente_hasta: None,
            entry_start: t(entry.0),
            entry_end: t(entry.1),
            exit_start: t("16:00"),
            exit_end: t("18:00"),
            entry_tolerance_min: tolerance,
            exit_tolerance_min: 0,
        }
    }

    async fn store_with_agent(area_id: Option<i64>) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store
            .insert_agents(vec![Agent {
                id: 7,
                apellido: "Gómez".into(),
                nombre: "Luis".into(),
                dni: None,
                cuil: None,
                legajo: None,
                area_id,
                supervisor_id: None,
                active: true,
                default_entry: None,
                default_exit: None,
            }])
            .await;
        Arc::new(store)
    }

    #[tokio::test]
    async fn mark_inside_window_with_tolerance() {
        let store = store_with_agent(Some(1)).await;
        store.insert_time_parameters(vec![params(1, "2025-01-01", ("07:00", "08:00"), 10)]).await;
        let v = ScheduleValidator::new(store);

        let ok = v.validate_mark(7, at("2025-03-03 08:10"), MarkKind::Entry).await.unwrap();
        assert_eq!(ok, MarkValidation::Ok { reason: None });

        let late = v.validate_mark(7, at("2025-03-03 08:11"), MarkKind::Entry).await.unwrap();
        assert_eq!(late, MarkValidation::Outside { window_start: t("06:50"), window_end: t("08:10") });

        let exit = v.validate_mark(7, at("2025-03-03 18:00"), MarkKind::Exit).await.unwrap();
        assert_eq!(exit, MarkValidation::Ok { reason: None });
    }

    #[tokio::test]
    async fn latest_vigente_parameters_apply() {
        let store = store_with_agent(Some(1)).await;
        store
            .insert_time_parameters(vec![
                params(1, "2024-01-01", ("07:00", "08:00"), 0),
                params(2, "2025-01-01", ("09:00", "10:00"), 0),
            ])
            .await;
        let v = ScheduleValidator::new(store);

        let old = v.validate_mark(7, at("2024-06-03 07:30"), MarkKind::Entry).await.unwrap();
        assert_eq!(old, MarkValidation::Ok { reason: None });
        let new = v.validate_mark(7, at("2025-06-03 07:30"), MarkKind::Entry).await.unwrap();
        assert!(matches!(new, MarkValidation::Outside { .. }));
    }

    #[tokio::test]
    async fn no_parameters_accepts_with_reason() {
        let store = store_with_agent(None).await;
        let v = ScheduleValidator::new(store);
        let res = v.validate_mark(7, at("2025-03-03 03:00"), MarkKind::Entry).await.unwrap();
        assert_eq!(res, MarkValidation::Ok { reason: Some("no config".into()) });
    }

    #[tokio::test]
    async fn availability_checks_leave_then_guard() {
        let store = store_with_agent(Some(1)).await;
        store
            .insert_leaves(vec![Leave {
                id: 1,
                agent_id: 7,
                leave_type_id: 1,
                type_code: Some("VAC".into()),
                date_from: d("2025-02-10"),
                date_to: d("2025-02-12"),
                state: LeaveState::Approved,
            }])
            .await;
        store
            .insert_guards(vec![Guard {
                id: 1,
                roster_id: 1,
                agent_id: 7,
                date: d("2025-02-14"),
                start_time: None,
                end_time: None,
                planned_hours: dec!(8),
                effective_hours: None,
                guard_type: "regular".into(),
                state: GuardState::Programmed,
                active: true,
                observations: None,
            }])
            .await;
        let v = ScheduleValidator::new(store);

        assert_eq!(
            v.check_availability(7, d("2025-02-11")).await.unwrap(),
            Availability::Unavailable { reason: "on leave".into() }
        );
        assert_eq!(
            v.check_availability(7, d("2025-02-14")).await.unwrap(),
            Availability::Unavailable { reason: "already assigned".into() }
        );
        assert!(v.check_availability(7, d("2025-02-13")).await.unwrap().is_available());
    }

    #[test]
    fn tolerance_is_clamped_to_the_day() {
        assert_eq!(widened(t("00:05"), t("23:55"), 30), (NaiveTime::MIN, t("23:59") + Duration::seconds(59)));
        assert_eq!("Salida".parse::<MarkKind>().unwrap(), MarkKind::Exit);
    }
}
