//! Left outer join on integer keys

use std::collections::HashMap;

use serde_json::Value;

use crate::table::{Table, TableResult, cell_as_i64};

/// Suffix added to reference columns whose names already exist on the left side
const COLLISION_SUFFIX: &str = "_ref";

/// Row counters for a join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched_rows: usize,
    pub unmatched_rows: usize,
}

/// Left outer join of `right` onto `left`
///
/// Every left row is kept. Keys are compared as integers, so `10`, `10.0` and `"10"` match each
/// other while null or non-numeric keys never match. A left row matching several right rows is
/// repeated once per match. All right columns are appended, including the key.
pub fn left_join(
    left: Table,
    right: &Table,
    left_key: &str,
    right_key: &str,
) -> TableResult<(Table, JoinStats)> {
    let left_index = left.require_column(left_key)?;
    let right_index = right.require_column(right_key)?;

    let mut lookup: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = cell_as_i64(&row[right_index]) {
            lookup.entry(key).or_default().push(i);
        }
    }

    let (left_columns, left_rows) = left.into_parts();
    let mut columns = left_columns.clone();
    for name in right.columns() {
        if left_columns.contains(name) {
            columns.push(format!("{name}{COLLISION_SUFFIX}"));
        } else {
            columns.push(name.clone());
        }
    }

    let mut stats = JoinStats::default();
    let mut joined = Table::new(columns);
    let empty = vec![Value::Null; right.column_count()];

    for row in left_rows {
        let matches = cell_as_i64(&row[left_index]).and_then(|key| lookup.get(&key));
        match matches {
            Some(indices) => {
                stats.matched_rows += 1;
                for &i in indices {
                    let mut out = row.clone();
                    out.extend(right.rows()[i].iter().cloned());
                    joined.push_row(out)?;
                }
            }
            None => {
                stats.unmatched_rows += 1;
                let mut out = row;
                out.extend(empty.iter().cloned());
                joined.push_row(out)?;
            }
        }
    }

    Ok((joined, stats))
}
