use crate::error::Result;
use crate::table::Table;

/// Rows of `table` whose `column` equals `value` exactly (case-sensitive).
///
/// Returns a new table; the input is left untouched. Missing cells never match.
pub fn filter_eq(table: &Table, column: &str, value: &str) -> Result<Table> {
    let idx = table.column_index(column)?;
    let rows = table
        .rows
        .iter()
        .filter(|row| row[idx].as_deref() == Some(value))
        .cloned()
        .collect();

    Ok(Table {
        headers: table.headers.clone(),
        rows,
    })
}

/// Drop every row that has a missing value in any of `columns`.
///
/// Returns the number of rows removed.
pub fn drop_missing(table: &mut Table, columns: &[&str]) -> Result<usize> {
    let indices = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>>>()?;

    let before = table.len();
    table.retain_rows(|row| indices.iter().all(|&i| row[i].is_some()));
    Ok(before - table.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load::parse_csv;

    fn wildfires() -> Table {
        parse_csv(
            "state,latitude,longitude\n\
             NY,42.0,-76.0\n\
             CA,34.0,-118.0\n\
             ny,43.0,-75.0\n\
             NY,,-74.0\n\
             ,40.0,-73.0\n",
        )
        .unwrap()
    }

    #[test]
    fn test_filter_is_exact_subset() {
        let table = wildfires();
        let filtered = filter_eq(&table, "state", "NY").unwrap();

        assert_eq!(filtered.len(), 2);
        assert!(filtered.len() <= table.len());
        assert!(filtered
            .column("state")
            .unwrap()
            .iter()
            .all(|v| *v == Some("NY")));

        let expected = table
            .column("state")
            .unwrap()
            .iter()
            .filter(|v| **v == Some("NY"))
            .count();
        assert_eq!(filtered.len(), expected);
    }

    #[test]
    fn test_filter_leaves_source_untouched() {
        let table = wildfires();
        let snapshot = table.clone();
        let _ = filter_eq(&table, "state", "CA").unwrap();
        assert_eq!(table, snapshot);
    }

    #[test]
    fn test_filter_unknown_column_fails() {
        assert!(filter_eq(&wildfires(), "city", "New York").is_err());
    }

    #[test]
    fn test_drop_missing_coordinates() {
        let mut table = wildfires();
        let dropped = drop_missing(&mut table, &["latitude", "longitude"]).unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(table.len(), 4);
        for column in ["latitude", "longitude"] {
            assert!(table.column(column).unwrap().iter().all(Option::is_some));
        }
    }

    #[test]
    fn test_drop_missing_treats_na_markers_as_missing() {
        let mut table = parse_csv(
            "uid,city,lat,lon\n\
             a,New York,NA,NA\n\
             b,New York,40.7,-73.9\n\
             c,New York,NaN,-73.9\n",
        )
        .unwrap();
        let dropped = drop_missing(&mut table, &["lat", "lon"]).unwrap();

        assert_eq!(dropped, 2);
        assert_eq!(table.column("uid").unwrap(), vec![Some("b")]);
    }
}
