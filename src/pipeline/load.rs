use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{EnricherError, Result};
use crate::table::Table;

/// Text encoding of an input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl FromStr for TextEncoding {
    type Err = EnricherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(EnricherError::Config(format!("Unsupported encoding '{other}'"))),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = EnricherError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl TextEncoding {
    fn decode(self, bytes: Vec<u8>, path: &Path) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|_| EnricherError::Encoding {
                path: path.to_path_buf(),
            }),
            TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Field values read as missing cells, besides the empty field.
pub const NA_VALUES: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(field: &str) -> bool {
    field.is_empty() || NA_VALUES.contains(&field)
}

/// Read a whole comma-separated file into memory.
///
/// The first record is the header row. Empty fields and the [`NA_VALUES`]
/// markers become missing cells.
/// A record whose field count differs from the header is an error.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_csv(path: &Path, encoding: TextEncoding) -> Result<Table> {
    let bytes = fs::read(path)?;
    let text = encoding.decode(bytes, path)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let table = parse_csv(text)?;
    debug!(
        "Loaded {} rows x {} columns",
        table.len(),
        table.headers.len()
    );
    Ok(table)
}

/// Parse CSV text that is already decoded.
pub fn parse_csv(text: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if is_missing(field) {
                    None
                } else {
                    Some(field.to_string())
                }
            })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_csv_marks_empty_fields_missing() {
        let table = parse_csv("state,latitude,longitude\nNY,42.0,\nCA,34.0,-118.0\n").unwrap();
        assert_eq!(table.headers, vec!["state", "latitude", "longitude"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, 2), None);
        assert_eq!(table.value(1, 2), Some("-118.0"));
    }

    #[test]
    fn test_parse_csv_reads_na_markers_as_missing() {
        let table = parse_csv(
            "uid,city,lat,lon\n\
             a,New York,NA,NA\n\
             b,New York,40.7,-73.9\n\
             c,New York,NaN,-73.9\n\
             d,null,#N/A,None\n",
        )
        .unwrap();
        assert_eq!(table.column("lat").unwrap(), vec![None, Some("40.7"), None, None]);
        assert_eq!(table.column("lon").unwrap(), vec![None, Some("-73.9"), Some("-73.9"), None]);
        assert_eq!(table.value(3, 1), None);
        // Markers are matched exactly, not as substrings.
        assert_eq!(parse_csv("name\nNAPA\n").unwrap().value(0, 0), Some("NAPA"));
    }

    #[test]
    fn test_parse_csv_handles_quoted_commas() {
        let table = parse_csv("city,name\n\"New York\",\"Doe, Jane\"\n").unwrap();
        assert_eq!(table.value(0, 1), Some("Doe, Jane"));
    }

    #[test]
    fn test_ragged_rows_are_fatal() {
        let err = parse_csv("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, EnricherError::Csv(_)));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = load_csv(Path::new("does/not/exist.csv"), TextEncoding::Utf8).unwrap_err();
        assert!(matches!(err, EnricherError::Io(_)));
    }

    #[test]
    fn test_latin1_file_decodes_high_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"city,victim_last\nNew York,Mu\xf1oz\n").unwrap();

        let table = load_csv(file.path(), TextEncoding::Latin1).unwrap();
        assert_eq!(table.value(0, 1), Some("Muñoz"));

        let err = load_csv(file.path(), TextEncoding::Utf8).unwrap_err();
        assert!(matches!(err, EnricherError::Encoding { .. }));
    }

    #[test]
    fn test_bom_is_stripped_from_first_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("\u{feff}state,latitude\nNY,42\n".as_bytes()).unwrap();
        let table = load_csv(file.path(), TextEncoding::Utf8).unwrap();
        assert_eq!(table.column_index("state").unwrap(), 0);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("latin-1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert_eq!("ISO-8859-1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert_eq!("UTF8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert!("cp1252".parse::<TextEncoding>().is_err());
    }
}
