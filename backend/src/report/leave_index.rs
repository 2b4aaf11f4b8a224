// backend/src/report/leave_index.rs

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::error::CoreResult;
use crate::models::{Leave, LeaveState};
use crate::store::Store;

const DEFAULT_LEAVE_CODE: &str = "LIC";

/// agent → date → leave type code, restricted to one date range.
#[derive(Debug, Clone, Default)]
pub struct LeaveIndex {
    by_agent: HashMap<i64, HashMap<NaiveDate, String>>,
}

impl LeaveIndex {
    pub async fn build(
        store: &dyn Store,
        agent_ids: &[i64],
        from: NaiveDate,
        to: NaiveDate,
        visible: LeaveState,
    ) -> CoreResult<Self> {
        if agent_ids.is_empty() {
            return Ok(Self::default());
        }
        let leaves = store.leaves_overlapping(agent_ids, from, to, visible).await?;
        Ok(Self::from_leaves(&leaves, from, to))
    }

    pub fn from_leaves(leaves: &[Leave], from: NaiveDate, to: NaiveDate) -> Self {
        let mut by_agent: HashMap<i64, HashMap<NaiveDate, String>> = HashMap::new();
        for leave in leaves {
            let start = leave.date_from.max(from);
            let end = leave.date_to.min(to);
            let code = leave
                .type_code
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_LEAVE_CODE);
            let days = by_agent.entry(leave.agent_id).or_default();
            for day in start.iter_days().take_while(|d| *d <= end) {
                days.entry(day).or_insert_with(|| code.to_string());
            }
        }
        Self { by_agent }
    }

    pub fn code(&self, agent_id: i64, day: NaiveDate) -> Option<&str> {
        self.by_agent.get(&agent_id)?.get(&day).map(String::as_str)
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.by_agent.values().flat_map(|days| days.keys().copied()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_agent.values().all(HashMap::is_empty)
    }
}
