// backend/src/report/export.rs

use csv::Writer;

use crate::error::{CoreError, CoreResult};
use crate::report::general::{Cell, GeneralReport};
use crate::report::individual::IndividualReport;

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::Invariant(format!("csv export failed: {e}"))
    }
}

fn finish(writer: Writer<Vec<u8>>) -> CoreResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::invariant(format!("csv export failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::invariant(format!("csv export is not utf-8: {e}")))
}

/// One line per guard row, then a `total` line carrying the effective hours.
pub fn individual_csv(report: &IndividualReport) -> CoreResult<String> {
    let mut w = Writer::from_writer(Vec::new());
    w.write_record([
        "date",
        "weekday",
        "start",
        "end",
        "planned_hours",
        "effective_hours",
        "motive",
        "remark",
        "attendance_state",
    ])?;
    for row in &report.days {
        let planned = row.planned_hours.to_string();
        let effective = row.effective_hours.to_string();
        w.write_record([
            row.date.as_str(),
            row.weekday,
            row.start.as_str(),
            row.end.as_str(),
            planned.as_str(),
            effective.as_str(),
            row.motive.as_str(),
            row.remark.as_str(),
            row.attendance_state.as_str(),
        ])?;
    }
    let total = report.totals.effective_hours.to_string();
    w.write_record(["total", "", "", "", "", total.as_str(), "", "", ""])?;
    finish(w)
}

/// `legajo,apellido,nombre,<days…>,total`, one line per agent.
pub fn general_csv(report: &GeneralReport) -> CoreResult<String> {
    let mut w = Writer::from_writer(Vec::new());
    let mut header: Vec<String> = vec!["legajo".into(), "apellido".into(), "nombre".into()];
    header.extend(report.days_columns.iter().cloned());
    header.push("total".into());
    w.write_record(&header)?;

    for row in &report.agents {
        let mut record: Vec<String> = vec![
            row.legajo.clone().unwrap_or_default(),
            row.apellido.clone(),
            row.nombre.clone(),
        ];
        record.extend(row.cells.iter().map(|c| match c {
            Cell::Code(code) => code.clone(),
            Cell::Hours(h) => h.to_string(),
        }));
        record.push(row.total.to_string());
        w.write_record(&record)?;
    }
    finish(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::filters::ReportFilters;
    use crate::report::general::{AgentRow, GeneralTotals};
    use crate::report::individual::{AgentSummary, IndividualRow, IndividualTotals};
    use rust_decimal_macros::dec;

    #[test]
    fn general_csv_has_day_columns_between_name_and_total() {
        let report = GeneralReport {
            kind: "regular".into(),
            filters: ReportFilters::default(),
            days_columns: vec!["2025-02-10".into(), "2025-02-11".into()],
            agents: vec![AgentRow {
                agent_id: 4,
                apellido: "Pérez".into(),
                nombre: "Ana, María".into(),
                legajo: Some("L4".into()),
                area_id: Some(1),
                cells: vec![Cell::Hours(dec!(8)), Cell::Code("VAC".into())],
                total: dec!(8),
            }],
            totals: GeneralTotals { hours: dec!(8), agents: 1 },
        };
        let out = general_csv(&report).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "legajo,apellido,nombre,2025-02-10,2025-02-11,total");
        assert_eq!(lines[1], "L4,Pérez,\"Ana, María\",8,VAC,8");
    }

    #[test]
    fn individual_csv_ends_with_total_line() {
        let report = IndividualReport {
            kind: "individual",
            agent: AgentSummary {
                id: 7,
                apellido: "Gómez".into(),
                nombre: "Luis".into(),
                legajo: None,
                dni: None,
                area_id: None,
            },
            filters: ReportFilters::default(),
            days: vec![IndividualRow {
                date: "2025-01-05".into(),
                weekday: "Domingo",
                start: "22:00".into(),
                end: "06:00".into(),
                planned_hours: dec!(8),
                effective_hours: dec!(8),
                motive: "regular".into(),
                remark: String::new(),
                attendance_state: String::new(),
            }],
            totals: IndividualTotals { effective_hours: dec!(8) },
        };
        let out = individual_csv(&report).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2025-01-05,Domingo,22:00,06:00,8,8,regular,,");
        assert_eq!(lines[2], "total,,,,,8,,,");
    }
}
