// backend/src/report/general.rs

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CoreResult;
use crate::models::{Agent, Guard, LeaveState};
use crate::report::calendar::CalendarCatalog;
use crate::report::filters::ReportFilters;
use crate::report::guard_query::GuardQuery;
use crate::report::leave_index::LeaveIndex;
use crate::scope::{AreaScope, Scope};
use crate::store::Store;

pub const HOLIDAY_CODE: &str = "FER";

/// One grid cell: a leave/holiday code or an hour count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Code(String),
    Hours(Decimal),
}

impl Cell {
    pub fn hours(&self) -> Option<Decimal> {
        match self {
            Self::Hours(h) => Some(*h),
            Self::Code(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRow {
    pub agent_id: i64,
    pub apellido: String,
    pub nombre: String,
    pub legajo: Option<String>,
    pub area_id: Option<i64>,
    pub cells: Vec<Cell>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralTotals {
    pub hours: Decimal,
    pub agents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralReport {
    pub kind: String,
    pub filters: ReportFilters,
    pub days_columns: Vec<String>,
    pub agents: Vec<AgentRow>,
    pub totals: GeneralTotals,
}

/// Which of two same-day guards fills the cell: more effective hours, then
/// more planned hours, then the earlier start.
fn better_guard(candidate: &Guard, current: &Guard) -> bool {
    let by_effective = candidate.effective_hours.cmp(&current.effective_hours);
    let by_planned = candidate.planned_hours.cmp(&current.planned_hours);
    let by_start = match (candidate.start_time, current.start_time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };
    by_effective.then(by_planned).then(by_start) == Ordering::Greater
}

/// Active agents in scope, restricted to the explicit area and agent
/// filters, in (apellido, nombre, id) order.
async fn agent_universe(store: &dyn Store, filters: &ReportFilters, scope: &Scope) -> CoreResult<Vec<Agent>> {
    let mut agents = if scope.self_only {
        let ids = scope.agent_ids.clone().unwrap_or_default();
        store.agents_by_ids(&ids).await?.into_iter().filter(|a| a.active).collect()
    } else if scope.area_scope.is_empty() {
        Vec::new()
    } else {
        let mut agents = store.active_agents_in(&scope.area_scope).await?;
        if let Some(areas) = &filters.area {
            agents.retain(|a| a.area_id.map_or(false, |x| areas.contains(&x)));
        }
        agents
    };
    if let Some(ids) = &scope.agent_ids {
        agents.retain(|a| ids.contains(&a.id));
    }
    if let Some(ids) = &filters.agent {
        agents.retain(|a| ids.contains(&a.id));
    }
    agents.sort_by(|a, b| {
        a.apellido
            .cmp(&b.apellido)
            .then_with(|| a.nombre.cmp(&b.nombre))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(agents)
}

pub(crate) async fn build(
    store: &dyn Store,
    filters: &ReportFilters,
    scope: &Scope,
    max_span_days: i64,
    visible_leaves: LeaveState,
) -> CoreResult<GeneralReport> {
    let (from, to) = filters.period(max_span_days)?;
    let kind = filters.guard_type.clone().unwrap_or_else(|| "regular".to_string());

    let agents = agent_universe(store, filters, scope).await?;
    let ids: Vec<i64> = agents.iter().map(|a| a.id).collect();

    let query = GuardQuery {
        date_from: from,
        date_to: to,
        guard_type: filters.guard_type.clone(),
        agent_ids: Some(ids.clone()),
        area_scope: AreaScope::Unbounded,
    };
    // Leaves and holidays cover the carry-over day so its column follows the
    // same precedence as the rest.
    let lookup_from = query.carry_over_date();

    let leaves = if filters.include_leaves {
        LeaveIndex::build(store, &ids, lookup_from, to, visible_leaves).await?
    } else {
        LeaveIndex::default()
    };
    let calendar = if filters.include_holidays && !agents.is_empty() {
        CalendarCatalog::build(store, lookup_from, to).await?
    } else {
        CalendarCatalog::default()
    };

    let guards = if ids.is_empty() { Vec::new() } else { query.run(store).await? };

    let mut best: HashMap<(i64, NaiveDate), &Guard> = HashMap::new();
    for jg in &guards {
        let g = &jg.guard;
        best.entry((g.agent_id, g.date))
            .and_modify(|cur| {
                if better_guard(g, *cur) {
                    *cur = g;
                }
            })
            .or_insert(g);
    }

    let mut day_set: BTreeSet<NaiveDate> = guards.iter().map(|jg| jg.guard.date).collect();
    day_set.extend(leaves.dates().into_iter().filter(|d| *d >= from));
    day_set.extend(
        calendar
            .dates()
            .into_iter()
            .filter(|d| *d >= from && agents.iter().any(|a| calendar.is_holiday(*d, a.area_id))),
    );
    let columns: Vec<NaiveDate> = day_set.into_iter().collect();

    let rows: Vec<AgentRow> = agents
        .iter()
        .map(|agent| {
            let cells: Vec<Cell> = columns
                .iter()
                .map(|&day| {
                    if let Some(code) = leaves.code(agent.id, day) {
                        Cell::Code(code.to_string())
                    } else if calendar.is_holiday(day, agent.area_id) {
                        Cell::Code(HOLIDAY_CODE.to_string())
                    } else {
                        Cell::Hours(best.get(&(agent.id, day)).map_or(Decimal::ZERO, |g| g.reported_hours()))
                    }
                })
                .collect();
            let total = cells.iter().filter_map(Cell::hours).sum();
            AgentRow {
                agent_id: agent.id,
                apellido: agent.apellido.clone(),
                nombre: agent.nombre.clone(),
                legajo: agent.legajo.clone(),
                area_id: agent.area_id,
                cells,
                total,
            }
        })
        .collect();

    let totals = GeneralTotals {
        hours: rows.iter().map(|r| r.total).sum(),
        agents: rows.len(),
    };

    Ok(GeneralReport {
        kind,
        filters: filters.clone(),
        days_columns: columns.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        agents: rows,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuardState, Holiday, Leave, Role, Roster, RosterState};
    use crate::report::filters::raw_from_pairs;
    use crate::store::MemoryStore;
    use chrono::{NaiveTime, Utc};
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn guard(id: i64, date: &str, start: (&str, &str), planned: Decimal, effective: Option<Decimal>) -> Guard {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        Guard {
            id,
            roster_id: 1,
            agent_id: 7,
            date: d(date),
            start_time: Some(t(start.0)),
            end_time: Some(t(start.1)),
            planned_hours: planned,
            effective_hours: effective,
            guard_type: "regular".into(),
            state: GuardState::Programmed,
            active: true,
            observations: None,
        }
    }

    fn leave(agent_id: i64, code: &str, from: &str, to: &str) -> Leave {
        Leave {
            id: agent_id,
            agent_id,
            leave_type_id: 1,
            type_code: Some(code.into()),
            date_from: d(from),
            date_to: d(to),
            state: LeaveState::Approved,
        }
    }

    async fn store_with(guards: Vec<Guard>) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_agents(vec![Agent {
                id: 7,
                apellido: "Benitez".into(),
                nombre: "Ana".into(),
                dni: None,
                cuil: None,
                legajo: Some("L7".into()),
                area_id: Some(1),
                supervisor_id: None,
                active: true,
                default_entry: None,
                default_exit: None,
            }])
            .await;
        store
            .insert_rosters(vec![Roster {
                id: 1,
                area_id: 1,
                date_from: d("2025-03-01"),
                date_to: d("2025-03-31"),
                kind: "monthly".into(),
                state: RosterState::Approved,
                start_time: NaiveTime::MIN,
                end_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
                created_by: 1,
                approved_by: Some(1),
                payload_hash: None,
                created_at: Utc::now(),
            }])
            .await;
        store.insert_guards(guards).await;
        store
    }

    async fn report(store: &MemoryStore, from: &str, to: &str) -> GeneralReport {
        let raw = raw_from_pairs(vec![
            ("date_from".into(), from.into()),
            ("date_to".into(), to.into()),
            ("include_leaves".into(), "true".into()),
            ("include_holidays".into(), "true".into()),
        ]);
        let filters = ReportFilters::normalize(&raw).unwrap();
        let scope = Scope { role: Role::Administrator, area_scope: AreaScope::Unbounded, agent_ids: None, self_only: false };
        build(store, &filters, &scope, 62, LeaveState::Approved).await.unwrap()
    }

    #[tokio::test]
    async fn effective_hours_pick_the_same_day_guard() {
        let store = store_with(vec![
            guard(1, "2025-03-05", ("08:00", "16:00"), dec!(8), Some(dec!(6))),
            guard(2, "2025-03-05", ("16:00", "22:00"), dec!(5), Some(dec!(7))),
        ])
        .await;
        let r = report(&store, "2025-03-01", "2025-03-31").await;
        assert_eq!(r.agents[0].cells, vec![Cell::Hours(dec!(7))]);
    }

    #[tokio::test]
    async fn planned_hours_break_an_effective_tie() {
        let store = store_with(vec![
            guard(1, "2025-03-05", ("08:00", "12:00"), dec!(4), None),
            guard(2, "2025-03-05", ("14:00", "20:00"), dec!(6), None),
        ])
        .await;
        let r = report(&store, "2025-03-01", "2025-03-31").await;
        assert_eq!(r.agents[0].cells, vec![Cell::Hours(dec!(6))]);
    }

    #[test]
    fn earlier_start_breaks_a_full_tie() {
        let early = guard(1, "2025-03-05", ("06:00", "12:00"), dec!(6), Some(dec!(6)));
        let late = guard(2, "2025-03-05", ("13:00", "19:00"), dec!(6), Some(dec!(6)));
        assert!(better_guard(&early, &late));
        assert!(!better_guard(&late, &early));

        let missing = Guard { start_time: None, ..late.clone() };
        assert!(better_guard(&late, &missing));
    }

    #[tokio::test]
    async fn leave_wins_over_holiday_on_the_same_date() {
        let store = store_with(vec![guard(1, "2025-03-03", ("08:00", "16:00"), dec!(8), Some(dec!(8)))]).await;
        store.insert_leaves(vec![leave(7, "ART", "2025-03-03", "2025-03-03")]).await;
        store
            .insert_holidays(vec![Holiday {
                id: 1,
                name: "Carnaval".into(),
                date_from: d("2025-03-03"),
                date_to: d("2025-03-04"),
                area_id: None,
            }])
            .await;
        let r = report(&store, "2025-03-01", "2025-03-31").await;
        assert_eq!(r.days_columns, ["2025-03-03", "2025-03-04"]);
        assert_eq!(r.agents[0].cells, vec![Cell::Code("ART".into()), Cell::Code(HOLIDAY_CODE.into())]);
        assert_eq!(r.agents[0].total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn carry_over_column_shows_a_leave_on_that_day() {
        let store = store_with(vec![
            guard(1, "2025-03-09", ("22:00", "06:00"), dec!(8), Some(dec!(8))),
            guard(2, "2025-03-10", ("08:00", "16:00"), dec!(8), Some(dec!(8))),
        ])
        .await;
        store.insert_leaves(vec![leave(7, "LAR", "2025-03-09", "2025-03-09")]).await;
        let r = report(&store, "2025-03-10", "2025-03-10").await;
        assert_eq!(r.days_columns, ["2025-03-09", "2025-03-10"]);
        assert_eq!(r.agents[0].cells, vec![Cell::Code("LAR".into()), Cell::Hours(dec!(8))]);
    }

    #[tokio::test]
    async fn leave_before_the_period_adds_no_column_by_itself() {
        let store = store_with(vec![guard(2, "2025-03-10", ("08:00", "16:00"), dec!(8), None)]).await;
        store.insert_leaves(vec![leave(7, "LAR", "2025-03-09", "2025-03-09")]).await;
        let r = report(&store, "2025-03-10", "2025-03-10").await;
        assert_eq!(r.days_columns, ["2025-03-10"]);
    }
}
