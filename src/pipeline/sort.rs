use std::cmp::Ordering;

use crate::error::Result;
use crate::table::Table;

/// Parse a cell as a finite number, the way a lenient numeric coercion would.
fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Canonical text for a number: integral values lose their fractional part.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Rewrite `column` as numbers. Anything that does not parse becomes missing.
///
/// Returns the parsed values in row order.
pub fn coerce_numeric(table: &mut Table, column: &str) -> Result<Vec<Option<f64>>> {
    let idx = table.column_index(column)?;
    let mut parsed = Vec::with_capacity(table.len());

    for row in &mut table.rows {
        let number = row[idx].as_deref().and_then(parse_number);
        row[idx] = number.map(format_number);
        parsed.push(number);
    }

    Ok(parsed)
}

/// Coerce `column` to numbers, then stable-sort rows ascending by it.
///
/// Missing values sort after all numbers; ties keep their input order.
pub fn sort_by_numeric(mut table: Table, column: &str) -> Result<Table> {
    let keys = coerce_numeric(&mut table, column)?;

    let mut keyed: Vec<_> = keys.into_iter().zip(table.rows).collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    table.rows = keyed.into_iter().map(|(_, row)| row).collect();
    Ok(table)
}
