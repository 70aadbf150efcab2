//! Group-by summary over report rows.

use std::collections::HashMap;

use serde::Serialize;

use super::columns::ReportColumn;
use super::rows::ReportRow;

pub const GROUP_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryGroup {
    pub key: String,
    pub values: Vec<String>,
    pub count: usize,
}

/// Group rows by the concatenated values of `columns`.
///
/// Groups are ordered by count descending, then by key.
pub fn summarize(rows: &[ReportRow], columns: &[&'static ReportColumn]) -> Vec<SummaryGroup> {
    let mut groups: HashMap<String, SummaryGroup> = HashMap::new();
    for row in rows {
        let values: Vec<String> = columns.iter().map(|c| row.get(c.id).to_string()).collect();
        let key = values.join(GROUP_SEPARATOR);
        groups
            .entry(key.clone())
            .or_insert_with(|| SummaryGroup {
                key,
                values,
                count: 0,
            })
            .count += 1;
    }

    let mut groups: Vec<SummaryGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{find_column, CellValue, ReportType};
    use std::collections::BTreeMap;

    fn row(id: i64, sex: &str, status: &str) -> ReportRow {
        let mut cells = BTreeMap::new();
        cells.insert("sex".to_string(), CellValue::text(sex));
        cells.insert("status".to_string(), CellValue::text(status));
        ReportRow { id, cells }
    }

    #[test]
    fn test_groups_sorted_by_count_then_key() {
        let rows = vec![
            row(1, "female", "active"),
            row(2, "male", "active"),
            row(3, "female", "active"),
            row(4, "female", "sold"),
            row(5, "male", "sold"),
        ];
        let columns = vec![
            find_column(ReportType::Birds, "sex").unwrap(),
            find_column(ReportType::Birds, "status").unwrap(),
        ];
        let groups = summarize(&rows, &columns);
        let keys: Vec<_> = groups.iter().map(|g| (g.key.as_str(), g.count)).collect();
        assert_eq!(
            keys,
            vec![
                ("female | active", 2),
                ("female | sold", 1),
                ("male | active", 1),
                ("male | sold", 1),
            ]
        );
        assert_eq!(groups[0].values, vec!["female", "active"]);
    }

    #[test]
    fn test_empty_rows() {
        let columns = vec![find_column(ReportType::Birds, "sex").unwrap()];
        assert!(summarize(&[], &columns).is_empty());
    }
}
