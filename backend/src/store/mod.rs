// backend/src/store/mod.rs

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CoreResult;
use crate::models::{
    Agent, AgentRole, Area, AreaTimeParameters, AttendanceRecord, BonusAssignment, BonusRule, Holiday,
    JoinedGuard, Leave, LeaveState,
};
use crate::report::guard_query::GuardQuery;
use crate::scope::AreaScope;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ───────────────────────────────────────
// Planner write set
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRoster {
    pub area_id: i64,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub kind: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_by: i64,
    pub payload_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGuard {
    pub agent_id: i64,
    pub date: NaiveDate,
    pub planned_hours: Decimal,
}

/// Everything the planner writes in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWrite {
    pub roster: NewRoster,
    pub guards: Vec<NewGuard>,
}

impl PlanWrite {
    /// Number of distinct (agent, date) keys; later items upsert earlier ones.
    pub fn distinct_guards(&self) -> usize {
        self.guards.iter().map(|g| (g.agent_id, g.date)).collect::<HashSet<_>>().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommittedPlan {
    pub roster_id: i64,
    pub guard_count: usize,
}

/// Storage the core reads from and writes to. Implementations must apply
/// `GuardQuery::matches` semantics in `fetch_guards` and make `commit_plan`
/// all-or-nothing.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_areas(&self) -> CoreResult<Vec<Area>>;

    async fn get_agent(&self, id: i64) -> CoreResult<Option<Agent>>;

    async fn agents_by_ids(&self, ids: &[i64]) -> CoreResult<Vec<Agent>>;

    /// Active agents whose area is inside `scope`.
    async fn active_agents_in(&self, scope: &AreaScope) -> CoreResult<Vec<Agent>>;

    async fn roles_of(&self, agent_id: i64) -> CoreResult<Vec<AgentRole>>;

    /// Ids of agents whose supervisor is `supervisor_id`.
    async fn direct_subordinates(&self, supervisor_id: i64) -> CoreResult<Vec<i64>>;

    async fn fetch_guards(&self, query: &GuardQuery) -> CoreResult<Vec<JoinedGuard>>;

    async fn attendance(&self, agent_id: i64, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AttendanceRecord>>;

    async fn leaves_overlapping(
        &self,
        agent_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
        state: LeaveState,
    ) -> CoreResult<Vec<Leave>>;

    async fn holidays_overlapping(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>>;

    async fn has_active_guard(&self, agent_id: i64, date: NaiveDate) -> CoreResult<bool>;

    async fn time_parameters(&self, area_id: i64) -> CoreResult<Vec<AreaTimeParameters>>;

    async fn commit_plan(&self, plan: &PlanWrite) -> CoreResult<CommittedPlan>;

    async fn bonus_rules(&self) -> CoreResult<Vec<BonusRule>>;

    /// Σ effective hours of the agent's active, non-cancelled guards in the month.
    async fn monthly_effective_hours(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Decimal>;

    async fn bonus_assignment(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Option<BonusAssignment>>;

    /// Write if the stored version still equals `expected_version` (`None` =
    /// no row yet). Returns `false` when another writer got there first.
    async fn save_bonus_assignment(
        &self,
        assignment: &BonusAssignment,
        expected_version: Option<i32>,
    ) -> CoreResult<bool>;
}
