//! CSV export of report pages.

use anyhow::Context;
use chrono::NaiveDate;

use super::columns::ReportType;
use super::rows::ReportPage;

/// `<type>_export_<YYYY-MM-DD>.csv`
pub fn export_filename(report_type: ReportType, date: NaiveDate) -> String {
    format!("{}_export_{}.csv", report_type, date.format("%Y-%m-%d"))
}

/// Render a page as CSV: one header row of column labels, then one record
/// per row. Fields are quoted only when they contain a comma, a quote or a
/// line break; embedded quotes are doubled.
pub fn to_csv(page: &ReportPage, localized: bool) -> anyhow::Result<String> {
    let mut out = csv_line(page.columns.iter().map(|c| c.label_for(localized).to_string()))
        .context("failed to write CSV header")?;
    for row in &page.rows {
        let line = csv_line(page.columns.iter().map(|c| row.get(c.id).to_string()))
            .with_context(|| format!("failed to write CSV row {}", row.id))?;
        out.push_str(&line);
    }
    Ok(out)
}

/// One CSV record with its terminator.
///
/// A record made of a single empty field is written as a bare line break;
/// the csv writer would emit `""` for it.
fn csv_line<I>(fields: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = String>,
{
    let fields: Vec<String> = fields.into_iter().collect();
    if let [only] = fields.as_slice() {
        if only.is_empty() {
            return Ok("\n".to_string());
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV output: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{find_column, CellValue, ReportRow};
    use std::collections::BTreeMap;

    fn page(rows: Vec<ReportRow>) -> ReportPage {
        let columns = vec![
            *find_column(ReportType::Birds, "name").unwrap(),
            *find_column(ReportType::Birds, "notes").unwrap(),
        ];
        ReportPage {
            report_type: ReportType::Birds,
            columns,
            total: rows.len(),
            limit: rows.len(),
            offset: 0,
            rows,
        }
    }

    fn row(id: i64, name: &str, notes: CellValue) -> ReportRow {
        let mut cells = BTreeMap::new();
        cells.insert("name".to_string(), CellValue::text(name));
        cells.insert("notes".to_string(), notes);
        ReportRow { id, cells }
    }

    #[test]
    fn test_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 9).unwrap();
        assert_eq!(
            export_filename(ReportType::Eggs, date),
            "eggs_export_2024-07-09.csv"
        );
    }

    #[test]
    fn test_escaping() {
        let csv = to_csv(
            &page(vec![
                row(1, "Plain", CellValue::Null),
                row(2, "Comma, Hen", CellValue::text("said \"cluck\"")),
                row(3, "Multi", CellValue::text("line\nbreak")),
            ]),
            false,
        )
        .unwrap();
        assert_eq!(
            csv,
            "Name,Notes\nPlain,\n\"Comma, Hen\",\"said \"\"cluck\"\"\"\nMulti,\"line\nbreak\"\n"
        );
    }

    #[test]
    fn test_single_empty_column_is_not_quoted() {
        let mut page = page(vec![
            row(1, "Plain", CellValue::Null),
            row(2, "Noted", CellValue::text("broody")),
        ]);
        page.columns.remove(0);
        assert_eq!(to_csv(&page, false).unwrap(), "Notes\n\nbroody\n");
    }

    #[test]
    fn test_localized_header() {
        let csv = to_csv(&page(vec![]), true).unwrap();
        assert_eq!(csv, "ชื่อ,หมายเหตุ\n");
    }
}
