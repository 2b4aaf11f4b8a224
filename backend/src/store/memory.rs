// backend/src/store/memory.rs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{CommittedPlan, PlanWrite, Store};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Agent, AgentRole, Area, AreaTimeParameters, AttendanceRecord, BonusAssignment, BonusRule, Guard, GuardState,
    Holiday, JoinedGuard, Leave, LeaveState, Roster, RosterState,
};
use crate::report::guard_query::GuardQuery;
use crate::scope::AreaScope;

#[derive(Default)]
struct Tables {
    areas: BTreeMap<i64, Area>,
    agents: BTreeMap<i64, Agent>,
    roles: Vec<AgentRole>,
    rosters: BTreeMap<i64, Roster>,
    guards: BTreeMap<i64, Guard>,
    attendance: Vec<AttendanceRecord>,
    leaves: Vec<Leave>,
    holidays: Vec<Holiday>,
    time_parameters: Vec<AreaTimeParameters>,
    bonus_rules: Vec<BonusRule>,
    bonus: BTreeMap<(i64, i32, i32), BonusAssignment>,
}

impl Tables {
    fn next_roster_id(&self) -> i64 {
        self.rosters.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_guard_id(&self) -> i64 {
        self.guards.keys().next_back().map_or(1, |id| id + 1)
    }
}

/// In-process store with the same semantics as `PgStore`. Backs the test
/// suite and local demos.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    read_latency: Option<Duration>,
    failing_commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every guard read, to exercise report deadlines.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Make the next `n` plan commits fail with `Conflict`.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub async fn insert_areas(&self, areas: Vec<Area>) {
        let mut t = self.tables.write().await;
        t.areas.extend(areas.into_iter().map(|a| (a.id, a)));
    }

    pub async fn insert_agents(&self, agents: Vec<Agent>) {
        let mut t = self.tables.write().await;
        t.agents.extend(agents.into_iter().map(|a| (a.id, a)));
    }

    pub async fn insert_roles(&self, roles: Vec<AgentRole>) {
        self.tables.write().await.roles.extend(roles);
    }

    pub async fn insert_rosters(&self, rosters: Vec<Roster>) {
        let mut t = self.tables.write().await;
        t.rosters.extend(rosters.into_iter().map(|r| (r.id, r)));
    }

    pub async fn insert_guards(&self, guards: Vec<Guard>) {
        let mut t = self.tables.write().await;
        t.guards.extend(guards.into_iter().map(|g| (g.id, g)));
    }

    pub async fn insert_attendance(&self, records: Vec<AttendanceRecord>) {
        self.tables.write().await.attendance.extend(records);
    }

    pub async fn insert_leaves(&self, leaves: Vec<Leave>) {
        self.tables.write().await.leaves.extend(leaves);
    }

    pub async fn insert_holidays(&self, holidays: Vec<Holiday>) {
        self.tables.write().await.holidays.extend(holidays);
    }

    pub async fn insert_time_parameters(&self, params: Vec<AreaTimeParameters>) {
        self.tables.write().await.time_parameters.extend(params);
    }

    pub async fn insert_bonus_rules(&self, rules: Vec<BonusRule>) {
        self.tables.write().await.bonus_rules.extend(rules);
    }

    pub async fn rosters(&self) -> Vec<Roster> {
        self.tables.read().await.rosters.values().cloned().collect()
    }

    pub async fn guards(&self) -> Vec<Guard> {
        self.tables.read().await.guards.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_areas(&self) -> CoreResult<Vec<Area>> {
        Ok(self.tables.read().await.areas.values().cloned().collect())
    }

    async fn get_agent(&self, id: i64) -> CoreResult<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(&id).cloned())
    }

    async fn agents_by_ids(&self, ids: &[i64]) -> CoreResult<Vec<Agent>> {
        let t = self.tables.read().await;
        Ok(t.agents.values().filter(|a| ids.contains(&a.id)).cloned().collect())
    }

    async fn active_agents_in(&self, scope: &AreaScope) -> CoreResult<Vec<Agent>> {
        let t = self.tables.read().await;
        Ok(t.agents
            .values()
            .filter(|a| a.active && scope.contains(a.area_id))
            .cloned()
            .collect())
    }

    async fn roles_of(&self, agent_id: i64) -> CoreResult<Vec<AgentRole>> {
        let t = self.tables.read().await;
        Ok(t.roles.iter().filter(|r| r.agent_id == agent_id).cloned().collect())
    }

    async fn direct_subordinates(&self, supervisor_id: i64) -> CoreResult<Vec<i64>> {
        let t = self.tables.read().await;
        Ok(t.agents
            .values()
            .filter(|a| a.supervisor_id == Some(supervisor_id))
            .map(|a| a.id)
            .collect())
    }

    async fn fetch_guards(&self, query: &GuardQuery) -> CoreResult<Vec<JoinedGuard>> {
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
        let t = self.tables.read().await;
        let mut out = Vec::new();
        for g in t.guards.values() {
            let agent_area = t.agents.get(&g.agent_id).and_then(|a| a.area_id);
            if !query.matches(g, agent_area) {
                continue;
            }
            let roster = t
                .rosters
                .get(&g.roster_id)
                .ok_or_else(|| CoreError::invariant(format!("guard {} points at missing roster {}", g.id, g.roster_id)))?;
            out.push(JoinedGuard {
                guard: g.clone(),
                agent_area_id: agent_area,
                roster_area_id: roster.area_id,
                roster_state: roster.state,
            });
        }
        Ok(out)
    }

    async fn attendance(&self, agent_id: i64, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AttendanceRecord>> {
        let t = self.tables.read().await;
        Ok(t.attendance
            .iter()
            .filter(|r| r.agent_id == agent_id && from <= r.date && r.date <= to)
            .cloned()
            .collect())
    }

    async fn leaves_overlapping(
        &self,
        agent_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
        state: LeaveState,
    ) -> CoreResult<Vec<Leave>> {
        let t = self.tables.read().await;
        let mut out: Vec<Leave> = t
            .leaves
            .iter()
            .filter(|l| l.state == state && agent_ids.contains(&l.agent_id) && l.date_from <= to && l.date_to >= from)
            .cloned()
            .collect();
        out.sort_by_key(|l| l.id);
        Ok(out)
    }

    async fn holidays_overlapping(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>> {
        let t = self.tables.read().await;
        Ok(t.holidays
            .iter()
            .filter(|h| h.date_from <= to && h.date_to >= from)
            .cloned()
            .collect())
    }

    async fn has_active_guard(&self, agent_id: i64, date: NaiveDate) -> CoreResult<bool> {
        let t = self.tables.read().await;
        Ok(t.guards
            .values()
            .any(|g| g.agent_id == agent_id && g.date == date && g.active && g.state != GuardState::Cancelled))
    }

    async fn time_parameters(&self, area_id: i64) -> CoreResult<Vec<AreaTimeParameters>> {
        let t = self.tables.read().await;
        Ok(t.time_parameters.iter().filter(|p| p.area_id == area_id).cloned().collect())
    }

    async fn commit_plan(&self, plan: &PlanWrite) -> CoreResult<CommittedPlan> {
        if self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CoreError::Conflict("concurrent plan commit".into()));
        }

        // One write guard for the whole plan: validate first, then apply.
        let mut t = self.tables.write().await;
        if !t.areas.contains_key(&plan.roster.area_id) {
            return Err(CoreError::Storage(format!("area {} does not exist", plan.roster.area_id)));
        }
        if let Some(g) = plan.guards.iter().find(|g| !t.agents.contains_key(&g.agent_id)) {
            return Err(CoreError::Storage(format!("agent {} does not exist", g.agent_id)));
        }

        let roster_id = t.next_roster_id();
        let r = &plan.roster;
        t.rosters.insert(
            roster_id,
            Roster {
                id: roster_id,
                area_id: r.area_id,
                date_from: r.date_from,
                date_to: r.date_to,
                kind: r.kind.clone(),
                state: RosterState::Generated,
                start_time: r.start_time,
                end_time: r.end_time,
                created_by: r.created_by,
                approved_by: None,
                payload_hash: Some(r.payload_hash.clone()),
                created_at: Utc::now(),
            },
        );

        for ng in &plan.guards {
            let existing = t.guards.values_mut().find(|g| {
                g.roster_id == roster_id
                    && g.agent_id == ng.agent_id
                    && g.date == ng.date
                    && g.state != GuardState::Cancelled
            });
            match existing {
                Some(g) => {
                    g.planned_hours = ng.planned_hours;
                    g.state = GuardState::Draft;
                    g.active = false;
                }
                None => {
                    let id = t.next_guard_id();
                    t.guards.insert(
                        id,
                        Guard {
                            id,
                            roster_id,
                            agent_id: ng.agent_id,
                            date: ng.date,
                            start_time: None,
                            end_time: None,
                            planned_hours: ng.planned_hours,
                            effective_hours: None,
                            guard_type: "regular".into(),
                            state: GuardState::Draft,
                            active: false,
                            observations: None,
                        },
                    );
                }
            }
        }

        Ok(CommittedPlan { roster_id, guard_count: plan.distinct_guards() })
    }

    async fn bonus_rules(&self) -> CoreResult<Vec<BonusRule>> {
        Ok(self.tables.read().await.bonus_rules.clone())
    }

    async fn monthly_effective_hours(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Decimal> {
        let t = self.tables.read().await;
        Ok(t.guards
            .values()
            .filter(|g| {
                g.agent_id == agent_id
                    && g.active
                    && g.state != GuardState::Cancelled
                    && g.date.year() == year
                    && g.date.month() == month
            })
            .map(|g| g.effective_hours.unwrap_or(Decimal::ZERO))
            .sum())
    }

    async fn bonus_assignment(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Option<BonusAssignment>> {
        let t = self.tables.read().await;
        Ok(t.bonus.get(&(agent_id, year, month as i32)).cloned())
    }

    async fn save_bonus_assignment(
        &self,
        assignment: &BonusAssignment,
        expected_version: Option<i32>,
    ) -> CoreResult<bool> {
        let mut t = self.tables.write().await;
        let key = (assignment.agent_id, assignment.year, assignment.month);
        let current = t.bonus.get(&key).map(|b| b.version);
        if current != expected_version {
            return Ok(false);
        }
        let mut row = assignment.clone();
        row.version = current.map_or(1, |v| v + 1);
        t.bonus.insert(key, row);
        Ok(true)
    }
}
