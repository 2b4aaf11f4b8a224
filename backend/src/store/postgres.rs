// backend/src/store/postgres.rs

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::{query, query_as, query_scalar, FromRow, Pool, Postgres};
use tracing::warn;

use super::{CommittedPlan, PlanWrite, Store};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Agent, AgentRole, Area, AreaTimeParameters, AttendanceRecord, BonusAssignment, BonusRule, Guard, Holiday,
    JoinedGuard, Leave, LeaveState,
};
use crate::report::guard_query::GuardQuery;
use crate::scope::AreaScope;

const AGENT_COLUMNS: &str = "id, apellido, nombre, dni, cuil, legajo, area_id, supervisor_id, active, \
                             default_entry, default_exit";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types for tables with text-encoded enums
// ─────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct AgentRoleRow {
    id: i64,
    agent_id: i64,
    role_name: String,
    area_id: Option<i64>,
}

#[derive(FromRow)]
struct GuardRow {
    id: i64,
    roster_id: i64,
    agent_id: i64,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    planned_hours: Decimal,
    effective_hours: Option<Decimal>,
    guard_type: String,
    state: String,
    active: bool,
    observations: Option<String>,
    agent_area_id: Option<i64>,
    roster_area_id: i64,
    roster_state: String,
}

impl TryFrom<GuardRow> for JoinedGuard {
    type Error = CoreError;

    fn try_from(r: GuardRow) -> CoreResult<Self> {
        Ok(JoinedGuard {
            guard: Guard {
                id: r.id,
                roster_id: r.roster_id,
                agent_id: r.agent_id,
                date: r.date,
                start_time: r.start_time,
                end_time: r.end_time,
                planned_hours: r.planned_hours,
                effective_hours: r.effective_hours,
                guard_type: r.guard_type,
                state: r.state.parse().map_err(CoreError::Invariant)?,
                active: r.active,
                observations: r.observations,
            },
            agent_area_id: r.agent_area_id,
            roster_area_id: r.roster_area_id,
            roster_state: r.roster_state.parse().map_err(CoreError::Invariant)?,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: i64,
    agent_id: i64,
    leave_type_id: i64,
    type_code: Option<String>,
    date_from: NaiveDate,
    date_to: NaiveDate,
    state: String,
}

impl TryFrom<LeaveRow> for Leave {
    type Error = CoreError;

    fn try_from(r: LeaveRow) -> CoreResult<Self> {
        Ok(Leave {
            id: r.id,
            agent_id: r.agent_id,
            leave_type_id: r.leave_type_id,
            type_code: r.type_code,
            date_from: r.date_from,
            date_to: r.date_to,
            state: r.state.parse().map_err(CoreError::Invariant)?,
        })
    }
}

fn month_bounds(year: i32, month: u32) -> CoreResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::invalid_filter(format!("invalid month {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| CoreError::invalid_filter(format!("invalid month {year}-{month}")))?;
    Ok((start, next))
}

#[async_trait]
impl Store for PgStore {
    async fn list_areas(&self) -> CoreResult<Vec<Area>> {
        let rows = query_as::<_, Area>(r#"SELECT id, name, parent_id, active FROM public.areas ORDER BY id"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_agent(&self, id: i64) -> CoreResult<Option<Agent>> {
        let row = query_as::<_, Agent>(&format!("SELECT {AGENT_COLUMNS} FROM public.agents WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn agents_by_ids(&self, ids: &[i64]) -> CoreResult<Vec<Agent>> {
        let rows = query_as::<_, Agent>(&format!(
            "SELECT {AGENT_COLUMNS} FROM public.agents WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn active_agents_in(&self, scope: &AreaScope) -> CoreResult<Vec<Agent>> {
        let rows = query_as::<_, Agent>(&format!(
            "SELECT {AGENT_COLUMNS} FROM public.agents
              WHERE active AND ($1::bigint[] IS NULL OR area_id = ANY($1))
              ORDER BY apellido, nombre, id"
        ))
        .bind(scope.ids())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn roles_of(&self, agent_id: i64) -> CoreResult<Vec<AgentRole>> {
        let rows = query_as::<_, AgentRoleRow>(
            r#"SELECT ar.id, ar.agent_id, r.name AS role_name, ar.area_id
                 FROM public.agent_roles ar
                 JOIN public.roles r ON r.id = ar.role_id
                WHERE ar.agent_id = $1
                ORDER BY ar.id"#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| match r.role_name.parse() {
                Ok(role) => Some(AgentRole { id: r.id, agent_id: r.agent_id, role, area_id: r.area_id }),
                Err(e) => {
                    warn!(agent_id, "ignoring role assignment {}: {e}", r.id);
                    None
                }
            })
            .collect())
    }

    async fn direct_subordinates(&self, supervisor_id: i64) -> CoreResult<Vec<i64>> {
        let ids = query_scalar::<_, i64>(r#"SELECT id FROM public.agents WHERE supervisor_id = $1 ORDER BY id"#)
            .bind(supervisor_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn fetch_guards(&self, q: &GuardQuery) -> CoreResult<Vec<JoinedGuard>> {
        let rows = query_as::<_, GuardRow>(
            r#"
            SELECT g.id, g.roster_id, g.agent_id, g.date, g.start_time, g.end_time,
                   g.planned_hours, g.effective_hours, g.guard_type, g.state, g.active, g.observations,
                   a.area_id AS agent_area_id, r.area_id AS roster_area_id, r.state AS roster_state
              FROM public.guards g
              JOIN public.agents a ON a.id = g.agent_id
              JOIN public.rosters r ON r.id = g.roster_id
             WHERE g.active
               AND (g.date BETWEEN $1 AND $2
                    OR (g.date = $3 AND g.date < $1 AND g.start_time > g.end_time))
               AND ($4::text IS NULL OR g.guard_type = $4)
               AND ($5::bigint[] IS NULL OR g.agent_id = ANY($5))
               AND ($6::bigint[] IS NULL OR a.area_id = ANY($6))
             ORDER BY g.date, g.start_time NULLS LAST, g.id
            "#,
        )
        .bind(q.date_from)
        .bind(q.date_to)
        .bind(q.carry_over_date())
        .bind(q.guard_type.as_deref())
        .bind(q.agent_ids.as_deref())
        .bind(q.area_scope.ids())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JoinedGuard::try_from).collect()
    }

    async fn attendance(&self, agent_id: i64, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<AttendanceRecord>> {
        let rows = query_as::<_, AttendanceRecord>(
            r#"SELECT agent_id, date, state FROM public.attendance
                WHERE agent_id = $1 AND date BETWEEN $2 AND $3
                ORDER BY date, id"#,
        )
        .bind(agent_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn leaves_overlapping(
        &self,
        agent_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
        state: LeaveState,
    ) -> CoreResult<Vec<Leave>> {
        let rows = query_as::<_, LeaveRow>(
            r#"SELECT l.id, l.agent_id, l.leave_type_id, t.code AS type_code, l.date_from, l.date_to, l.state
                 FROM public.leaves l
                 JOIN public.leave_types t ON t.id = l.leave_type_id
                WHERE l.agent_id = ANY($1) AND l.state = $2
                  AND l.date_from <= $4 AND l.date_to >= $3
                ORDER BY l.id"#,
        )
        .bind(agent_ids)
        .bind(state.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Leave::try_from).collect()
    }

    async fn holidays_overlapping(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>> {
        let rows = query_as::<_, Holiday>(
            r#"SELECT id, name, date_from, date_to, area_id FROM public.holidays
                WHERE date_from <= $2 AND date_to >= $1
                ORDER BY date_from, id"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn has_active_guard(&self, agent_id: i64, date: NaiveDate) -> CoreResult<bool> {
        let found = query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                 SELECT 1 FROM public.guards
                  WHERE agent_id = $1 AND date = $2 AND active AND state <> 'cancelled')"#,
        )
        .bind(agent_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn time_parameters(&self, area_id: i64) -> CoreResult<Vec<AreaTimeParameters>> {
        let rows = query_as::<_, AreaTimeParameters>(
            r#"SELECT id, area_id, vigente_desde, vigente_hasta, entry_start, entry_end, exit_start, exit_end,
                      entry_tolerance_min, exit_tolerance_min
                 FROM public.area_time_parameters
                WHERE area_id = $1
                ORDER BY vigente_desde DESC, id DESC"#,
        )
        .bind(area_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn commit_plan(&self, plan: &PlanWrite) -> CoreResult<CommittedPlan> {
        let mut tx = self.pool.begin().await?;
        let r = &plan.roster;

        let roster_id = query_scalar::<_, i64>(
            r#"
            INSERT INTO public.rosters
                (area_id, date_from, date_to, kind, state, start_time, end_time, created_by, approved_by, payload_hash)
            VALUES ($1, $2, $3, $4, 'generated', $5, $6, $7, NULL, $8)
            RETURNING id
            "#,
        )
        .bind(r.area_id)
        .bind(r.date_from)
        .bind(r.date_to)
        .bind(&r.kind)
        .bind(r.start_time)
        .bind(r.end_time)
        .bind(r.created_by)
        .bind(&r.payload_hash)
        .fetch_one(&mut *tx)
        .await?;

        // Conflict-upsert on the (roster, agent, date) key of live guards.
        for g in &plan.guards {
            query(
                r#"
                INSERT INTO public.guards
                    (roster_id, agent_id, date, planned_hours, guard_type, state, active, updated_by)
                VALUES ($1, $2, $3, $4, 'regular', 'draft', FALSE, $5)
                ON CONFLICT (roster_id, agent_id, date) WHERE state <> 'cancelled'
                DO UPDATE SET planned_hours = EXCLUDED.planned_hours,
                              state = 'draft',
                              active = FALSE,
                              updated_by = EXCLUDED.updated_by,
                              updated_at = now()
                "#,
            )
            .bind(roster_id)
            .bind(g.agent_id)
            .bind(g.date)
            .bind(g.planned_hours)
            .bind(r.created_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(CommittedPlan { roster_id, guard_count: plan.distinct_guards() })
    }

    async fn bonus_rules(&self) -> CoreResult<Vec<BonusRule>> {
        let rows = query_as::<_, BonusRule>(
            r#"SELECT id, active, vigente_desde, vigente_hasta, monthly_minimum_hours, bonus_percentage, area_id
                 FROM public.bonus_rules
                ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn monthly_effective_hours(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Decimal> {
        let (start, next) = month_bounds(year, month)?;
        let hours = query_scalar::<_, Decimal>(
            r#"SELECT COALESCE(SUM(COALESCE(effective_hours, 0)), 0)
                 FROM public.guards
                WHERE agent_id = $1 AND active AND state <> 'cancelled'
                  AND date >= $2 AND date < $3"#,
        )
        .bind(agent_id)
        .bind(start)
        .bind(next)
        .fetch_one(&self.pool)
        .await?;
        Ok(hours)
    }

    async fn bonus_assignment(&self, agent_id: i64, year: i32, month: u32) -> CoreResult<Option<BonusAssignment>> {
        let row = query_as::<_, BonusAssignment>(
            r#"SELECT agent_id, year, month, effective_hours, percentage, version
                 FROM public.bonus_assignments
                WHERE agent_id = $1 AND year = $2 AND month = $3"#,
        )
        .bind(agent_id)
        .bind(year)
        .bind(month as i32)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save_bonus_assignment(
        &self,
        a: &BonusAssignment,
        expected_version: Option<i32>,
    ) -> CoreResult<bool> {
        let res = match expected_version {
            None => {
                query(
                    r#"INSERT INTO public.bonus_assignments
                           (agent_id, year, month, effective_hours, percentage, version)
                       VALUES ($1, $2, $3, $4, $5, 1)
                       ON CONFLICT (agent_id, year, month) DO NOTHING"#,
                )
                .bind(a.agent_id)
                .bind(a.year)
                .bind(a.month)
                .bind(a.effective_hours)
                .bind(a.percentage)
                .execute(&self.pool)
                .await?
            }
            Some(v) => {
                query(
                    r#"UPDATE public.bonus_assignments
                          SET effective_hours = $4, percentage = $5, version = version + 1, updated_at = now()
                        WHERE agent_id = $1 AND year = $2 AND month = $3 AND version = $6"#,
                )
                .bind(a.agent_id)
                .bind(a.year)
                .bind(a.month)
                .bind(a.effective_hours)
                .bind(a.percentage)
                .bind(v)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_roll_over_december() {
        let (start, next) = month_bounds(2025, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(month_bounds(2025, 13).is_err());
    }

    #[test]
    fn unknown_guard_state_is_an_invariant_error() {
        let row = GuardRow {
            id: 1,
            roster_id: 1,
            agent_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            start_time: None,
            end_time: None,
            planned_hours: Decimal::new(8, 0),
            effective_hours: None,
            guard_type: "regular".into(),
            state: "lost".into(),
            active: true,
            observations: None,
            agent_area_id: None,
            roster_area_id: 1,
            roster_state: "generated".into(),
        };
        assert_eq!(JoinedGuard::try_from(row).unwrap_err().kind(), "InvariantError");
    }
}
