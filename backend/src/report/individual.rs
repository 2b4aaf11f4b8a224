// backend/src/report/individual.rs

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::Agent;
use crate::report::filters::ReportFilters;
use crate::report::guard_query::GuardQuery;
use crate::scope::{AreaScope, Scope};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub id: i64,
    pub apellido: String,
    pub nombre: String,
    pub legajo: Option<String>,
    pub dni: Option<String>,
    pub area_id: Option<i64>,
}

impl From<&Agent> for AgentSummary {
    fn from(a: &Agent) -> Self {
        Self {
            id: a.id,
            apellido: a.apellido.clone(),
            nombre: a.nombre.clone(),
            legajo: a.legajo.clone(),
            dni: a.dni.clone(),
            area_id: a.area_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualRow {
    pub date: String,
    pub weekday: &'static str,
    pub start: String,
    pub end: String,
    pub planned_hours: Decimal,
    pub effective_hours: Decimal,
    pub motive: String,
    pub remark: String,
    pub attendance_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualTotals {
    pub effective_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualReport {
    pub kind: &'static str,
    pub agent: AgentSummary,
    pub filters: ReportFilters,
    pub days: Vec<IndividualRow>,
    pub totals: IndividualTotals,
}

pub fn weekday_name(day: NaiveDate) -> &'static str {
    match day.weekday() {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

pub fn hhmm(t: Option<NaiveTime>) -> String {
    t.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}

/// The single agent an individual report is about.
fn target_agent(filters: &ReportFilters, scope: &Scope) -> CoreResult<i64> {
    let ids = if scope.self_only { scope.agent_ids.as_deref() } else { filters.agent.as_deref() };
    match ids {
        Some([one]) => Ok(*one),
        _ => Err(CoreError::invalid_filter("individual report needs exactly one agent")),
    }
}

pub(crate) async fn build(
    store: &dyn Store,
    filters: &ReportFilters,
    scope: &Scope,
    max_span_days: i64,
) -> CoreResult<IndividualReport> {
    let (from, to) = filters.period(max_span_days)?;
    let agent_id = target_agent(filters, scope)?;
    let agent = store
        .get_agent(agent_id)
        .await?
        .filter(|a| a.active)
        .ok_or_else(|| CoreError::not_found(format!("agent {agent_id} not found or inactive")))?;
    if !scope.admits(&agent) {
        return Err(CoreError::denied(format!("agent {agent_id} is outside the caller's scope")));
    }

    let query = GuardQuery {
        date_from: from,
        date_to: to,
        guard_type: filters.guard_type.clone(),
        agent_ids: Some(vec![agent_id]),
        area_scope: AreaScope::Unbounded,
    };
    let guards = query.run(store).await?;

    let mut attendance: HashMap<NaiveDate, String> = HashMap::new();
    for rec in store.attendance(agent_id, query.carry_over_date(), to).await? {
        attendance.entry(rec.date).or_insert(rec.state);
    }

    let days: Vec<IndividualRow> = guards
        .iter()
        .map(|jg| {
            let g = &jg.guard;
            IndividualRow {
                date: g.date.format("%Y-%m-%d").to_string(),
                weekday: weekday_name(g.date),
                start: hhmm(g.start_time),
                end: hhmm(g.end_time),
                planned_hours: g.planned_hours,
                effective_hours: g.reported_hours(),
                motive: g.guard_type.clone(),
                remark: g.observations.clone().unwrap_or_default(),
                attendance_state: attendance.get(&g.date).cloned().unwrap_or_default(),
            }
        })
        .collect();

    let total = days.iter().map(|r| r.effective_hours).sum();

    Ok(IndividualReport {
        kind: "individual",
        agent: AgentSummary::from(&agent),
        filters: filters.clone(),
        days,
        totals: IndividualTotals { effective_hours: total },
    })
}
