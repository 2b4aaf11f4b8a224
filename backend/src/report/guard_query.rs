// backend/src/report/guard_query.rs

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};

use crate::error::CoreResult;
use crate::models::{Guard, JoinedGuard};
use crate::scope::AreaScope;
use crate::store::Store;

/// Guards relevant to a period: everything dated inside `[date_from,
/// date_to]` plus night guards started the day before that run into
/// `date_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub guard_type: Option<String>,
    pub agent_ids: Option<Vec<i64>>,
    pub area_scope: AreaScope,
}

impl GuardQuery {
    pub fn carry_over_date(&self) -> NaiveDate {
        self.date_from.checked_sub_days(Days::new(1)).unwrap_or(self.date_from)
    }

    /// The predicate every store implementation applies.
    pub fn matches(&self, guard: &Guard, agent_area_id: Option<i64>) -> bool {
        if !guard.active {
            return false;
        }
        let in_period = self.date_from <= guard.date && guard.date <= self.date_to;
        let carried = guard.date == self.carry_over_date()
            && guard.date < self.date_from
            && guard.crosses_midnight();
        if !(in_period || carried) {
            return false;
        }
        if let Some(t) = &self.guard_type {
            if &guard.guard_type != t {
                return false;
            }
        }
        if let Some(ids) = &self.agent_ids {
            if !ids.contains(&guard.agent_id) {
                return false;
            }
        }
        self.area_scope.contains(agent_area_id)
    }

    /// Fetch and order by (date, start_time, id). Missing start times sort last
    /// within a day.
    pub async fn run(&self, store: &dyn Store) -> CoreResult<Vec<JoinedGuard>> {
        let mut rows = store.fetch_guards(self).await?;
        rows.sort_by(|a, b| guard_order(&a.guard, &b.guard));
        Ok(rows)
    }
}

pub fn guard_order(a: &Guard, b: &Guard) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GuardState;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn guard(id: i64, date: &str, start: &str, end: &str) -> Guard {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        Guard {
            id,
            roster_id: 1,
            agent_id: 7,
            date: d(date),
            start_time: Some(t(start)),
            end_time: Some(t(end)),
            planned_hours: dec!(8),
            effective_hours: Some(dec!(8)),
            guard_type: "regular".into(),
            state: GuardState::Completed,
            active: true,
            observations: None,
        }
    }

    fn query(from: &str, to: &str) -> GuardQuery {
        GuardQuery {
            date_from: d(from),
            date_to: d(to),
            guard_type: None,
            agent_ids: None,
            area_scope: AreaScope::Unbounded,
        }
    }

    #[test]
    fn night_guard_from_previous_day_is_carried_over() {
        let q = query("2025-01-06", "2025-01-06");
        assert!(q.matches(&guard(1, "2025-01-05", "22:00", "06:00"), Some(1)));
        assert!(!q.matches(&guard(2, "2025-01-05", "08:00", "16:00"), Some(1)));
        assert!(!q.matches(&guard(3, "2025-01-04", "22:00", "06:00"), Some(1)));
    }

    #[test]
    fn inactive_wrong_type_and_out_of_scope_are_dropped() {
        let mut q = query("2025-01-06", "2025-01-07");
        let mut g = guard(1, "2025-01-06", "08:00", "16:00");
        g.active = false;
        assert!(!q.matches(&g, Some(1)));

        q.guard_type = Some("holiday".into());
        assert!(!q.matches(&guard(2, "2025-01-06", "08:00", "16:00"), Some(1)));

        q.guard_type = None;
        q.area_scope = AreaScope::Areas(BTreeSet::from([2]));
        assert!(!q.matches(&guard(3, "2025-01-06", "08:00", "16:00"), Some(1)));
        assert!(q.matches(&guard(3, "2025-01-06", "08:00", "16:00"), Some(2)));
    }

    #[test]
    fn ordering_is_date_then_start_then_id() {
        let mut rows = vec![
            guard(3, "2025-01-06", "08:00", "16:00"),
            guard(2, "2025-01-06", "08:00", "16:00"),
            guard(1, "2025-01-06", "06:00", "14:00"),
            guard(4, "2025-01-05", "22:00", "06:00"),
        ];
        rows.sort_by(guard_order);
        let ids: Vec<i64> = rows.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![4, 1, 2, 3]);
    }
}
