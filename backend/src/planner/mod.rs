// backend/src/planner/mod.rs

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::context::CoreContext;
use crate::error::{CoreError, CoreResult};
use crate::events::AuditEvent;
use crate::report::filters::parse_iso_date;
use crate::schedule::{Availability, ScheduleValidator};
use crate::scope::{Caller, ScopeResolver};
use crate::store::{CommittedPlan, NewGuard, NewRoster, PlanWrite, Store};

pub const ROSTER_KIND: &str = "monthly";

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAssignment {
    pub date: String,
    pub agent_id: i64,
    pub hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPayload {
    pub date_from: String,
    pub date_to: String,
    pub total_hours_budget: Decimal,
    #[serde(default)]
    pub area_id: Option<i64>,
    pub assignments: Vec<PlanAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub roster_id: i64,
    pub created_guard_count: usize,
    pub payload_hash: String,
    pub event: AuditEvent,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// SHA-256 hex of the payload's JSON form.
pub fn payload_hash(payload: &PlanPayload) -> CoreResult<String> {
    let bytes = serde_json::to_vec(payload).map_err(|e| CoreError::invalid_filter(format!("payload: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Payload-only checks; nothing here touches storage.
fn validate_payload(payload: &PlanPayload, max_assignments: usize) -> CoreResult<(NaiveDate, NaiveDate, Vec<NewGuard>)> {
    let from = parse_iso_date(&payload.date_from)?;
    let to = parse_iso_date(&payload.date_to)?;
    if from > to {
        return Err(CoreError::invalid_filter("date_from > date_to"));
    }
    if payload.total_hours_budget <= Decimal::ZERO {
        return Err(CoreError::invalid_filter("total_hours_budget must be positive"));
    }
    if payload.assignments.len() > max_assignments {
        return Err(CoreError::invalid_filter(format!(
            "{} assignments exceed the limit of {max_assignments} per call",
            payload.assignments.len()
        )));
    }

    let mut guards = Vec::with_capacity(payload.assignments.len());
    for (index, a) in payload.assignments.iter().enumerate() {
        let date = parse_iso_date(&a.date).map_err(|_| CoreError::assignment(index, "bad date format"))?;
        if date < from || date > to {
            return Err(CoreError::assignment(index, format!("date {date} is outside {from}..{to}")));
        }
        if a.hours <= Decimal::ZERO {
            return Err(CoreError::assignment(index, "hours must be positive"));
        }
        guards.push(NewGuard { agent_id: a.agent_id, date, planned_hours: a.hours });
    }

    let total: Decimal = guards.iter().map(|g| g.planned_hours).sum();
    if total > payload.total_hours_budget {
        return Err(CoreError::invalid_filter("assignments exceed budget"));
    }
    Ok((from, to, guards))
}

// ─────────────────────────────────────────────────────────────────────────────
// Planner
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RosterPlanner {
    store: Arc<dyn Store>,
    ctx: CoreContext,
}

impl RosterPlanner {
    pub fn new(store: Arc<dyn Store>, ctx: CoreContext) -> Self {
        Self { store, ctx }
    }

    /// Validate everything, then write the roster and its draft guards in one
    /// commit. Any failure leaves storage untouched.
    pub async fn plan(&self, payload: &PlanPayload, caller: &Caller) -> CoreResult<PlanOutcome> {
        let (from, to, guards) = validate_payload(payload, self.ctx.config.planner_max_assignments_per_call)?;

        let items: Vec<(usize, i64)> = guards.iter().enumerate().map(|(i, g)| (i, g.agent_id)).collect();
        ScopeResolver::new(self.store.as_ref())
            .ensure_direct_subordinates(caller, &items)
            .await?;

        let validator = ScheduleValidator::new(self.store.clone());
        for (index, g) in guards.iter().enumerate() {
            if let Availability::Unavailable { reason } = validator.check_availability(g.agent_id, g.date).await? {
                return Err(CoreError::assignment(
                    index,
                    format!("agent {} unavailable on {}: {reason}", g.agent_id, g.date),
                ));
            }
        }

        let area_id = self.resolve_area(payload.area_id, caller).await?;
        let hash = payload_hash(payload)?;
        let write = PlanWrite {
            roster: NewRoster {
                area_id,
                date_from: from,
                date_to: to,
                kind: ROSTER_KIND.to_string(),
                start_time: NaiveTime::MIN,
                end_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
                created_by: caller.id(),
                payload_hash: hash.clone(),
            },
            guards,
        };

        let committed = self.commit_with_retry(&write).await?;
        info!(
            caller = caller.id(),
            roster_id = committed.roster_id,
            area_id,
            guards = committed.guard_count,
            "roster planned"
        );

        let event = AuditEvent::new("plan", "roster", caller.id())
            .entity_id(committed.roster_id)
            .after(serde_json::json!({
                "area_id": area_id,
                "date_from": from,
                "date_to": to,
                "guard_count": committed.guard_count,
                "payload_hash": hash,
            }));
        event.emit();

        Ok(PlanOutcome {
            roster_id: committed.roster_id,
            created_guard_count: committed.guard_count,
            payload_hash: hash,
            event,
        })
    }

    /// Explicit area, else the caller's first area-scoped role, else the
    /// first active area by name.
    async fn resolve_area(&self, requested: Option<i64>, caller: &Caller) -> CoreResult<i64> {
        let areas = self.store.list_areas().await?;
        if let Some(id) = requested {
            return areas
                .iter()
                .find(|a| a.id == id && a.active)
                .map(|a| a.id)
                .ok_or_else(|| CoreError::not_found(format!("area {id} not found or inactive")));
        }
        if let Some(id) = caller.first_scoped_area() {
            return Ok(id);
        }
        areas
            .iter()
            .filter(|a| a.active)
            .min_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)))
            .map(|a| a.id)
            .ok_or_else(|| CoreError::not_found("no active area to plan into"))
    }

    async fn commit_with_retry(&self, write: &PlanWrite) -> CoreResult<CommittedPlan> {
        match self.store.commit_plan(write).await {
            Err(e) if e.is_transient() => {
                warn!(error = %e, "plan commit failed, retrying once");
                self.store.commit_plan(write).await
            }
            other => other,
        }
    }
}
