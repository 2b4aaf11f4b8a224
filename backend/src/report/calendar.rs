// backend/src/report/calendar.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::CoreResult;
use crate::models::Holiday;
use crate::store::Store;

/// Holidays inside one date range, flattened to days. National holidays
/// apply to every agent; area holidays only to agents of that area.
#[derive(Debug, Clone, Default)]
pub struct CalendarCatalog {
    national: HashSet<NaiveDate>,
    by_area: HashMap<i64, HashSet<NaiveDate>>,
}

impl CalendarCatalog {
    pub async fn build(store: &dyn Store, from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        let holidays = store.holidays_overlapping(from, to).await?;
        Ok(Self::from_holidays(&holidays, from, to))
    }

    pub fn from_holidays(holidays: &[Holiday], from: NaiveDate, to: NaiveDate) -> Self {
        let mut cat = Self::default();
        for h in holidays {
            let end = h.date_to.min(to);
            let days = h.date_from.max(from).iter_days().take_while(|d| *d <= end);
            match h.area_id {
                None => cat.national.extend(days),
                Some(area) => cat.by_area.entry(area).or_default().extend(days),
            }
        }
        cat
    }

    pub fn is_holiday(&self, day: NaiveDate, area_id: Option<i64>) -> bool {
        self.national.contains(&day)
            || area_id
                .and_then(|a| self.by_area.get(&a))
                .map_or(false, |days| days.contains(&day))
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.national
            .iter()
            .chain(self.by_area.values().flatten())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn holiday(from: &str, to: &str, area_id: Option<i64>) -> Holiday {
        Holiday { id: 1, name: "Feriado".into(), date_from: d(from), date_to: d(to), area_id }
    }

    #[test]
    fn national_holiday_applies_everywhere() {
        let cat = CalendarCatalog::from_holidays(&[holiday("2025-03-03", "2025-03-04", None)], d("2025-03-01"), d("2025-03-31"));
        assert!(cat.is_holiday(d("2025-03-04"), Some(9)));
        assert!(cat.is_holiday(d("2025-03-03"), None));
        assert!(!cat.is_holiday(d("2025-03-05"), None));
    }

    #[test]
    fn area_holiday_is_local() {
        let cat = CalendarCatalog::from_holidays(&[holiday("2025-03-10", "2025-03-10", Some(2))], d("2025-03-01"), d("2025-03-31"));
        assert!(cat.is_holiday(d("2025-03-10"), Some(2)));
        assert!(!cat.is_holiday(d("2025-03-10"), Some(3)));
        assert_eq!(cat.dates(), BTreeSet::from([d("2025-03-10")]));
    }

    #[test]
    fn range_clips_multi_day_holidays() {
        let cat = CalendarCatalog::from_holidays(&[holiday("2025-02-27", "2025-03-02", None)], d("2025-03-01"), d("2025-03-31"));
        assert_eq!(cat.dates(), BTreeSet::from([d("2025-03-01"), d("2025-03-02")]));
    }
}
