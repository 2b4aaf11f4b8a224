// backend/src/report/filters.rs

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Filters as they arrive from the boundary: query pairs or a JSON body.
pub type RawFilters = Map<String, Value>;

const TRUTHY: [&str; 8] = ["1", "true", "t", "yes", "y", "si", "sí", "on"];

/// Canonical report filters. Lists are lists or `None`, booleans are
/// strict, dates are parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportFilters {
    pub agent: Option<Vec<i64>>,
    pub area: Option<Vec<i64>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub guard_type: Option<String>,
    pub include_holidays: bool,
    pub include_leaves: bool,
}

impl ReportFilters {
    pub fn normalize(raw: &RawFilters) -> CoreResult<Self> {
        Ok(Self {
            agent: id_list(raw.get("agent"), "agent")?,
            area: id_list(raw.get("area"), "area")?,
            date_from: date(raw.get("date_from"))?,
            date_to: date(raw.get("date_to"))?,
            guard_type: text(raw.get("guard_type")),
            include_holidays: truthy(raw.get("include_holidays")),
            include_leaves: truthy(raw.get("include_leaves")),
        })
    }

    /// Back to the raw shape; `normalize(to_raw(f)) == f`.
    pub fn to_raw(&self) -> RawFilters {
        let ids = |v: &Option<Vec<i64>>| match v {
            Some(ids) => Value::from(ids.clone()),
            None => Value::Null,
        };
        let day = |d: &Option<NaiveDate>| match d {
            Some(d) => Value::from(d.format("%Y-%m-%d").to_string()),
            None => Value::Null,
        };
        let mut raw = Map::new();
        raw.insert("agent".into(), ids(&self.agent));
        raw.insert("area".into(), ids(&self.area));
        raw.insert("date_from".into(), day(&self.date_from));
        raw.insert("date_to".into(), day(&self.date_to));
        raw.insert(
            "guard_type".into(),
            self.guard_type.clone().map_or(Value::Null, Value::from),
        );
        raw.insert("include_holidays".into(), Value::from(self.include_holidays));
        raw.insert("include_leaves".into(), Value::from(self.include_leaves));
        raw
    }

    /// Both bounds present, ordered, and within `max_span_days`.
    pub fn period(&self, max_span_days: i64) -> CoreResult<(NaiveDate, NaiveDate)> {
        let (Some(from), Some(to)) = (self.date_from, self.date_to) else {
            return Err(CoreError::invalid_filter("date_from and date_to are required"));
        };
        if from > to {
            return Err(CoreError::invalid_filter("date_from > date_to"));
        }
        let span = (to - from).num_days() + 1;
        if span > max_span_days {
            return Err(CoreError::invalid_filter(format!(
                "date range spans {span} days, more than {max_span_days}"
            )));
        }
        Ok((from, to))
    }
}

/// Group repeated query keys into arrays (`agent=1&agent=2`).
pub fn raw_from_pairs(pairs: Vec<(String, String)>) -> RawFilters {
    let mut raw = Map::new();
    for (k, v) in pairs {
        match raw.get_mut(&k) {
            Some(Value::Array(items)) => items.push(Value::String(v)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(v)]);
            }
            None => {
                raw.insert(k, Value::String(v));
            }
        }
    }
    raw
}

fn is_null_token(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none")
}

/// Strict ISO `YYYY-MM-DD`.
pub fn parse_iso_date(s: &str) -> CoreResult<NaiveDate> {
    let s = s.trim();
    let b = s.as_bytes();
    let shaped = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter().enumerate().all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shaped {
        return Err(CoreError::invalid_filter("bad date format"));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CoreError::invalid_filter("bad date format"))
}

fn date(v: Option<&Value>) -> CoreResult<Option<NaiveDate>> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if is_null_token(s) => Ok(None),
        Some(Value::String(s)) => parse_iso_date(s).map(Some),
        Some(Value::Array(items)) => match items.last() {
            Some(last) => date(Some(last)),
            None => Ok(None),
        },
        Some(_) => Err(CoreError::invalid_filter("bad date format")),
    }
}

fn id_list(v: Option<&Value>, key: &str) -> CoreResult<Option<Vec<i64>>> {
    let mut out: Vec<i64> = Vec::new();
    collect_ids(v, key, &mut out)?;
    let mut seen = std::collections::HashSet::new();
    out.retain(|id| seen.insert(*id));
    Ok(if out.is_empty() { None } else { Some(out) })
}

fn collect_ids(v: Option<&Value>, key: &str, out: &mut Vec<i64>) -> CoreResult<()> {
    match v {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Number(n)) => {
            let id = n
                .as_i64()
                .ok_or_else(|| CoreError::invalid_filter(format!("bad {key} id '{n}'")))?;
            out.push(id);
            Ok(())
        }
        Some(Value::String(s)) => {
            for part in s.split(',').filter(|p| !is_null_token(p)) {
                let id = part
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| CoreError::invalid_filter(format!("bad {key} id '{}'", part.trim())))?;
                out.push(id);
            }
            Ok(())
        }
        Some(Value::Array(items)) => {
            for item in items {
                collect_ids(Some(item), key, out)?;
            }
            Ok(())
        }
        Some(other) => Err(CoreError::invalid_filter(format!("bad {key} value '{other}'"))),
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !is_null_token(s) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Array(items)) => text(items.last()),
        _ => None,
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map_or_else(|| n.as_f64().map_or(false, |f| f != 0.0), |i| i != 0),
        Some(Value::String(s)) => {
            let s = s.trim().to_lowercase();
            TRUTHY.contains(&s.as_str())
        }
        Some(Value::Array(items)) => truthy(items.last()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawFilters {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn scalars_become_lists() {
        let f = ReportFilters::normalize(&raw(json!({ "agent": 7, "area": "3, 4,3" }))).unwrap();
        assert_eq!(f.agent, Some(vec![7]));
        assert_eq!(f.area, Some(vec![3, 4]));
    }

    #[test]
    fn null_tokens_collapse_to_none() {
        let f = ReportFilters::normalize(&raw(json!({
            "agent": "", "area": "None", "date_from": "null", "guard_type": "  "
        })))
        .unwrap();
        assert_eq!(f, ReportFilters::default());
    }

    #[test]
    fn boolean_tokens() {
        for yes in [json!("Sí"), json!("YES"), json!("on"), json!(1), json!(true), json!("t")] {
            let f = ReportFilters::normalize(&raw(json!({ "include_leaves": yes }))).unwrap();
            assert!(f.include_leaves);
        }
        for no in [json!("no"), json!(0), json!("false"), json!({}), json!("maybe")] {
            let f = ReportFilters::normalize(&raw(json!({ "include_leaves": no }))).unwrap();
            assert!(!f.include_leaves);
        }
    }

    #[test]
    fn non_iso_dates_are_rejected() {
        for bad in ["06/01/2025", "2025-1-6", "2025-13-01", "20250106"] {
            let err = ReportFilters::normalize(&raw(json!({ "date_from": bad }))).unwrap_err();
            assert_eq!(err.to_string(), "bad date format");
        }
    }

    #[test]
    fn bad_ids_are_rejected() {
        let err = ReportFilters::normalize(&raw(json!({ "agent": "7,x" }))).unwrap_err();
        assert_eq!(err.kind(), "InvalidFilter");
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let once = ReportFilters::normalize(&raw(json!({
            "agent": ["4", 5], "area": 2, "date_from": "2025-02-01", "date_to": "2025-02-28",
            "guard_type": " regular ", "include_holidays": "si", "include_leaves": 0
        })))
        .unwrap();
        let twice = ReportFilters::normalize(&once.to_raw()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn period_checks_order_and_span() {
        let mut f = ReportFilters::default();
        assert!(f.period(366).is_err());
        f.date_from = NaiveDate::from_ymd_opt(2025, 2, 2);
        f.date_to = NaiveDate::from_ymd_opt(2025, 2, 1);
        assert_eq!(f.period(366).unwrap_err().to_string(), "date_from > date_to");
        f.date_to = NaiveDate::from_ymd_opt(2026, 2, 2);
        assert!(f.period(366).is_err());
        f.date_to = NaiveDate::from_ymd_opt(2025, 2, 2);
        assert!(f.period(366).is_ok());
    }

    #[test]
    fn repeated_query_keys_become_arrays() {
        let r = raw_from_pairs(vec![
            ("agent".into(), "1".into()),
            ("agent".into(), "2".into()),
            ("include_leaves".into(), "1".into()),
        ]);
        let f = ReportFilters::normalize(&r).unwrap();
        assert_eq!(f.agent, Some(vec![1, 2]));
        assert!(f.include_leaves);
    }
}
