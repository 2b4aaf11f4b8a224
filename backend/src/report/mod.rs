// backend/src/report/mod.rs

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::context::CoreContext;
use crate::error::{CoreError, CoreResult};
use crate::scope::{Access, Caller, ScopeResolver};
use crate::store::Store;

pub mod calendar;
pub mod export;
pub mod filters;
pub mod general;
pub mod guard_query;
pub mod individual;
pub mod leave_index;

pub use filters::{RawFilters, ReportFilters};
pub use general::GeneralReport;
pub use individual::IndividualReport;

/// Read-only report entry points. Each call normalizes the raw filters,
/// resolves the caller's scope and builds the report under a deadline.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
    ctx: CoreContext,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>, ctx: CoreContext) -> Self {
        Self { store, ctx }
    }

    pub async fn individual(&self, raw: &RawFilters, caller: &Caller) -> CoreResult<IndividualReport> {
        self.individual_within(raw, caller, self.ctx.config.report_timeout).await
    }

    pub async fn general(&self, raw: &RawFilters, caller: &Caller) -> CoreResult<GeneralReport> {
        self.general_within(raw, caller, self.ctx.config.report_timeout).await
    }

    pub async fn individual_within(
        &self,
        raw: &RawFilters,
        caller: &Caller,
        deadline: Duration,
    ) -> CoreResult<IndividualReport> {
        within(deadline, async {
            let filters = ReportFilters::normalize(raw)?;
            let store = self.store.as_ref();
            let scope = ScopeResolver::new(store).resolve(caller, &filters, Access::Read).await?;
            let report =
                individual::build(store, &filters, &scope, self.ctx.config.report_max_date_span_days).await?;
            info!(caller = caller.id(), agent_id = report.agent.id, rows = report.days.len(), "individual report");
            Ok(report)
        })
        .await
    }

    pub async fn general_within(
        &self,
        raw: &RawFilters,
        caller: &Caller,
        deadline: Duration,
    ) -> CoreResult<GeneralReport> {
        within(deadline, async {
            let filters = ReportFilters::normalize(raw)?;
            let store = self.store.as_ref();
            let scope = ScopeResolver::new(store).resolve(caller, &filters, Access::Read).await?;
            let report = general::build(
                store,
                &filters,
                &scope,
                self.ctx.config.report_max_date_span_days,
                self.ctx.config.report_default_leave_state,
            )
            .await?;
            info!(
                caller = caller.id(),
                agents = report.totals.agents,
                columns = report.days_columns.len(),
                "general report"
            );
            Ok(report)
        })
        .await
    }
}

/// Run `fut` to completion or fail with `Timeout`; never a partial result.
async fn within<T>(deadline: Duration, fut: impl Future<Output = CoreResult<T>>) -> CoreResult<T> {
    let started = Instant::now();
    match tokio::time::timeout(deadline, fut).await {
        Ok(res) => res,
        Err(_) => {
            let elapsed_ms = started.elapsed().as_millis();
            warn!(elapsed_ms, deadline_ms = deadline.as_millis(), "report deadline exceeded");
            Err(CoreError::Timeout { elapsed_ms })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, Area, AgentRole, Guard, GuardState, Roster, RosterState, Role};
    use crate::report::filters::raw_from_pairs;
    use crate::report::general::Cell;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn agent(id: i64, apellido: &str, area_id: i64) -> Agent {
        Agent {
            id,
            apellido: apellido.into(),
            nombre: "N".into(),
            dni: None,
            cuil: None,
            legajo: Some(format!("L{id}")),
            area_id: Some(area_id),
            supervisor_id: None,
            active: true,
            default_entry: None,
            default_exit: None,
        }
    }

    fn guard(id: i64, agent_id: i64, date: &str, planned: Decimal, effective: Option<Decimal>) -> Guard {
        Guard {
            id,
            roster_id: 1,
            agent_id,
            date: d(date),
            start_time: NaiveTime::from_hms_opt(8, 0, 0),
            end_time: NaiveTime::from_hms_opt(16, 0, 0),
            planned_hours: planned,
            effective_hours: effective,
            guard_type: "regular".into(),
            state: GuardState::Programmed,
            active: true,
            observations: None,
        }
    }

    async fn fixture(store: MemoryStore) -> (Arc<MemoryStore>, Caller) {
        store.insert_areas(vec![Area { id: 1, name: "Central".into(), parent_id: None, active: true }]).await;
        store
            .insert_agents(vec![agent(1, "Admin", 1), agent(2, "Zapata", 1), agent(3, "Alvarez", 1)])
            .await;
        store
            .insert_roles(vec![AgentRole { id: 1, agent_id: 1, role: Role::Administrator, area_id: None }])
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
        store
            .insert_guards(vec![
                guard(1, 2, "2025-03-03", dec!(8), Some(dec!(7.5))),
                guard(2, 2, "2025-03-04", dec!(8), None),
                guard(3, 3, "2025-03-04", dec!(12), Some(dec!(12))),
            ])
            .await;
        let store = Arc::new(store);
        let caller = ScopeResolver::new(store.as_ref()).load_caller(1).await.unwrap();
        (store, caller)
    }

    fn pairs(items: &[(&str, &str)]) -> RawFilters {
        raw_from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[tokio::test]
    async fn individual_total_is_sum_of_rows_and_stable() {
        let (store, caller) = fixture(MemoryStore::new()).await;
        let svc = ReportService::new(store, CoreContext::default());
        let raw = pairs(&[("agent", "2"), ("date_from", "2025-03-01"), ("date_to", "2025-03-31")]);

        let first = svc.individual(&raw, &caller).await.unwrap();
        let sum: Decimal = first.days.iter().map(|r| r.effective_hours).sum();
        assert_eq!(first.totals.effective_hours, sum);
        assert_eq!(sum, dec!(15.5));

        let second = svc.individual(&raw, &caller).await.unwrap();
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    #[tokio::test]
    async fn general_rows_sorted_and_totals_add_up() {
        let (store, caller) = fixture(MemoryStore::new()).await;
        let svc = ReportService::new(store, CoreContext::default());
        let raw = pairs(&[("date_from", "2025-03-01"), ("date_to", "2025-03-31")]);

        let report = svc.general(&raw, &caller).await.unwrap();
        let names: Vec<&str> = report.agents.iter().map(|r| r.apellido.as_str()).collect();
        assert_eq!(names, ["Admin", "Alvarez", "Zapata"]);
        assert_eq!(report.days_columns, ["2025-03-03", "2025-03-04"]);
        for row in &report.agents {
            let sum: Decimal = row.cells.iter().filter_map(Cell::hours).sum();
            assert_eq!(row.total, sum);
        }
        assert_eq!(report.totals.hours, dec!(27.5));
        assert_eq!(report.agents[0].cells, vec![Cell::Hours(Decimal::ZERO), Cell::Hours(Decimal::ZERO)]);
    }

    #[tokio::test]
    async fn slow_store_times_out_without_partial_result() {
        let (store, caller) = fixture(MemoryStore::new().with_read_latency(Duration::from_millis(200))).await;
        let svc = ReportService::new(store, CoreContext::default());
        let raw = pairs(&[("date_from", "2025-03-01"), ("date_to", "2025-03-31")]);

        let err = svc.general_within(&raw, &caller, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout { elapsed_ms } if elapsed_ms >= 20));
    }

    #[tokio::test]
    async fn malformed_filters_fail_before_touching_scope() {
        let (store, caller) = fixture(MemoryStore::new()).await;
        let svc = ReportService::new(store, CoreContext::default());
        let raw = pairs(&[("date_from", "2025-3-1"), ("date_to", "2025-03-31")]);
        let err = svc.general(&raw, &caller).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidFilter");
    }
}
