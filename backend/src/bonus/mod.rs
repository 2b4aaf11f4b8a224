// backend/src/bonus/mod.rs

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::context::CoreContext;
use crate::error::{CoreError, CoreResult};
use crate::models::{BonusAssignment, BonusRule};
use crate::scope::AreaScope;
use crate::store::Store;

/// Optimistic write attempts per agent before giving up with `Conflict`.
const SAVE_ATTEMPTS: usize = 3;

/// Percentage of the best rule the hours qualify for, or zero.
///
/// Only rules in force on `today` count, and an area-bound rule only counts
/// for agents of that area. Rules are tried from the highest percentage
/// down, so more hours never yield a lower percentage.
pub fn percentage_for(rules: &[BonusRule], effective_hours: Decimal, area_id: Option<i64>, today: NaiveDate) -> Decimal {
    let mut candidates: Vec<&BonusRule> = rules
        .iter()
        .filter(|r| r.is_vigente(today))
        .filter(|r| r.area_id.is_none() || r.area_id == area_id)
        .collect();
    candidates.sort_by(|a, b| b.bonus_percentage.cmp(&a.bonus_percentage).then(a.id.cmp(&b.id)));
    candidates
        .into_iter()
        .find(|r| r.monthly_minimum_hours <= effective_hours)
        .map_or(Decimal::ZERO, |r| r.bonus_percentage)
}

fn check_month(month: u32) -> CoreResult<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(CoreError::invalid_filter(format!("invalid month {month}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerateSummary {
    pub processed: usize,
    pub assigned: usize,
}

#[derive(Clone)]
pub struct BonusEvaluator {
    store: Arc<dyn Store>,
    ctx: CoreContext,
}

impl BonusEvaluator {
    pub fn new(store: Arc<dyn Store>, ctx: CoreContext) -> Self {
        Self { store, ctx }
    }

    pub async fn evaluate(&self, agent_id: i64, month: u32, year: i32) -> CoreResult<Decimal> {
        check_month(month)?;
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("agent {agent_id} not found")))?;
        let hours = self.store.monthly_effective_hours(agent_id, year, month).await?;
        let rules = self.store.bonus_rules().await?;
        let pct = percentage_for(&rules, hours, agent.area_id, self.ctx.today.today());
        debug!(agent_id, year, month, %hours, %pct, "bonus evaluated");
        Ok(pct)
    }

    /// Evaluate every active agent for the month and store the result.
    /// Agents are processed in parallel; each record is written under a
    /// version check.
    pub async fn generate_month(&self, month: u32, year: i32) -> CoreResult<GenerateSummary> {
        check_month(month)?;
        let today = self.ctx.today.today();
        let rules: Arc<Vec<BonusRule>> = Arc::new(self.store.bonus_rules().await?);
        let agents = self.store.active_agents_in(&AreaScope::Unbounded).await?;

        let mut tasks = JoinSet::new();
        for agent in agents {
            let store = self.store.clone();
            let rules = rules.clone();
            tasks.spawn(async move {
                let hours = store.monthly_effective_hours(agent.id, year, month).await?;
                let pct = percentage_for(&rules, hours, agent.area_id, today);
                store_assignment(store.as_ref(), agent.id, year, month, hours, pct).await?;
                Ok::<bool, CoreError>(pct > Decimal::ZERO)
            });
        }

        let mut summary = GenerateSummary { processed: 0, assigned: 0 };
        while let Some(joined) = tasks.join_next().await {
            let qualified = joined.map_err(|e| CoreError::invariant(format!("bonus task failed: {e}")))??;
            summary.processed += 1;
            if qualified {
                summary.assigned += 1;
            }
        }
        info!(year, month, processed = summary.processed, assigned = summary.assigned, "bonus month generated");
        Ok(summary)
    }
}

/// Read the current version, write if unchanged, retry on a lost race.
async fn store_assignment(
    store: &dyn Store,
    agent_id: i64,
    year: i32,
    month: u32,
    hours: Decimal,
    pct: Decimal,
) -> CoreResult<()> {
    for _ in 0..SAVE_ATTEMPTS {
        let current = store.bonus_assignment(agent_id, year, month).await?;
        if let Some(cur) = &current {
            if cur.effective_hours == hours && cur.percentage == pct {
                return Ok(());
            }
        }
        let row = BonusAssignment {
            agent_id,
            year,
            month: month as i32,
            effective_hours: hours,
            percentage: pct,
            version: 0,
        };
        if store.save_bonus_assignment(&row, current.map(|c| c.version)).await? {
            return Ok(());
        }
        debug!(agent_id, year, month, "bonus assignment changed underneath, retrying");
    }
    Err(CoreError::Conflict(format!(
        "bonus assignment for agent {agent_id} {year}-{month:02} kept changing"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TodaySource;
    use crate::models::{Agent, Guard, GuardState};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rule(id: i64, min: Decimal, pct: Decimal) -> BonusRule {
        BonusRule {
            id,
            active: true,
            vigente_desde: d("2024-01-01"),
            vigente_hasta: None,
            monthly_minimum_hours: min,
            bonus_percentage: pct,
            area_id: None,
        }
    }

    fn standard_rules() -> Vec<BonusRule> {
        vec![rule(1, dec!(80), dec!(5)), rule(2, dec!(120), dec!(10)), rule(3, dec!(160), dec!(15))]
    }

    #[test]
    fn thresholds_pick_best_qualifying_rule() {
        let today = d("2025-06-01");
        let rules = standard_rules();
        assert_eq!(percentage_for(&rules, dec!(119), None, today), dec!(5));
        assert_eq!(percentage_for(&rules, dec!(160), None, today), dec!(15));
        assert_eq!(percentage_for(&rules, dec!(40), None, today), Decimal::ZERO);
    }

    #[test]
    fn percentage_never_drops_as_hours_grow() {
        let today = d("2025-06-01");
        let rules = standard_rules();
        let mut last = Decimal::ZERO;
        for h in 0..=200 {
            let pct = percentage_for(&rules, Decimal::from(h), None, today);
            assert!(pct >= last, "{h} hours gave {pct} after {last}");
            last = pct;
        }
    }

    #[test]
    fn expired_inactive_and_foreign_area_rules_are_ignored() {
        let today = d("2025-06-01");
        let mut expired = rule(1, dec!(0), dec!(50));
        expired.vigente_hasta = Some(d("2025-05-31"));
        let mut inactive = rule(2, dec!(0), dec!(40));
        inactive.active = false;
        let mut future = rule(3, dec!(0), dec!(30));
        future.vigente_desde = d("2025-06-02");
        let mut other_area = rule(4, dec!(0), dec!(20));
        other_area.area_id = Some(9);
        let mut own_area = rule(5, dec!(0), dec!(10));
        own_area.area_id = Some(1);

        let rules = vec![expired, inactive, future, other_area, own_area];
        assert_eq!(percentage_for(&rules, dec!(100), Some(1), today), dec!(10));
        assert_eq!(percentage_for(&rules, dec!(100), None, today), Decimal::ZERO);
    }

    fn agent(id: i64) -> Agent {
        Agent {
            id,
            apellido: format!("A{id}"),
            nombre: "N".into(),
            dni: None,
            cuil: None,
            legajo: None,
            area_id: Some(1),
            supervisor_id: None,
            active: true,
            default_entry: None,
            default_exit: None,
        }
    }

    fn worked(id: i64, agent_id: i64, date: &str, effective: Decimal) -> Guard {
        Guard {
            id,
            roster_id: 1,
            agent_id,
            date: d(date),
            start_time: None,
            end_time: None,
            planned_hours: effective,
            effective_hours: Some(effective),
            guard_type: "regular".into(),
            state: GuardState::Completed,
            active: true,
            observations: None,
        }
    }

    async fn fixture() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_agents(vec![agent(1), agent(2), agent(3)]).await;
        store.insert_bonus_rules(standard_rules()).await;
        store
            .insert_guards(vec![
                worked(1, 1, "2025-05-02", dec!(80)),
                worked(2, 1, "2025-05-09", dec!(40)),
                worked(3, 2, "2025-05-02", dec!(40)),
                // outside the month
                worked(4, 3, "2025-06-01", dec!(200)),
            ])
            .await;
        Arc::new(store)
    }

    fn ctx() -> CoreContext {
        CoreContext::default().with_today(TodaySource::Fixed(d("2025-06-15")))
    }

    #[tokio::test]
    async fn evaluate_sums_the_month() {
        let store = fixture().await;
        let bonus = BonusEvaluator::new(store, ctx());
        assert_eq!(bonus.evaluate(1, 5, 2025).await.unwrap(), dec!(10));
        assert_eq!(bonus.evaluate(2, 5, 2025).await.unwrap(), Decimal::ZERO);
        assert_eq!(bonus.evaluate(1, 13, 2025).await.unwrap_err().kind(), "InvalidFilter");
        assert_eq!(bonus.evaluate(99, 5, 2025).await.unwrap_err().kind(), "NotFound");
    }

    #[tokio::test]
    async fn generate_month_is_repeatable() {
        let store = fixture().await;
        let bonus = BonusEvaluator::new(store.clone(), ctx());

        let first = bonus.generate_month(5, 2025).await.unwrap();
        assert_eq!(first, GenerateSummary { processed: 3, assigned: 1 });
        let second = bonus.generate_month(5, 2025).await.unwrap();
        assert_eq!(first, second);

        let row = store.bonus_assignment(1, 2025, 5).await.unwrap().unwrap();
        assert_eq!(row.percentage, dec!(10));
        assert_eq!(row.effective_hours, dec!(120));
        assert_eq!(row.version, 1);
    }

    #[tokio::test]
    async fn changed_hours_bump_the_version() {
        let store = fixture().await;
        let bonus = BonusEvaluator::new(store.clone(), ctx());
        bonus.generate_month(5, 2025).await.unwrap();

        store.insert_guards(vec![worked(5, 2, "2025-05-20", dec!(45))]).await;
        let summary = bonus.generate_month(5, 2025).await.unwrap();
        assert_eq!(summary.assigned, 2);

        let row = store.bonus_assignment(2, 2025, 5).await.unwrap().unwrap();
        assert_eq!((row.percentage, row.version), (dec!(5), 2));
    }
}
