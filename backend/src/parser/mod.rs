//! CSV ingestion with encoding and delimiter auto-detection.
//!
//! Maps the six logical input fields onto whatever headers the export uses.
//! Header matching is case-insensitive and accepts a few aliases per field.
//! No cleaning happens here beyond turning empty nullable cells into `None`;
//! trimming, lowercasing and vocabulary checks belong to the normalizer.

use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::RawRecord;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub records: Vec<RawRecord>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers as found in the file
    pub headers: Vec<String>,
}

/// A logical input field and the headers that may carry it.
struct Column {
    field: &'static str,
    aliases: &'static [&'static str],
}

const COHORT: Column = Column { field: "cohort", aliases: &["cohort", "cohort_term", "cohort_year"] };
const START_MAJOR: Column = Column {
    field: "start major",
    aliases: &["cohort_major_desc", "start_maj", "start_major"],
};
const END_MAJOR: Column = Column {
    field: "end major",
    aliases: &["deg_major_desc", "end_maj", "end_major"],
};
const URM: Column = Column { field: "urm", aliases: &["urm", "urm_status"] };
const ADMISSION: Column = Column {
    field: "admission type",
    aliases: &["freshman_transfer", "fresh", "admission_type"],
};
const HEADCOUNT: Column = Column { field: "headcount", aliases: &["headcount", "count"] };

impl Column {
    fn locate(&self, headers: &[String]) -> CsvResult<usize> {
        self.aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
            .ok_or_else(|| CsvError::MissingColumn {
                field: self.field,
                accepted: self.aliases.join(", "),
            })
    }
}

/// Column positions of the logical fields.
struct ColumnMap {
    cohort: usize,
    start_major: usize,
    end_major: usize,
    urm: usize,
    admission: usize,
    headcount: usize,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> CsvResult<Self> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        Ok(Self {
            cohort: COHORT.locate(&lowered)?,
            start_major: START_MAJOR.locate(&lowered)?,
            end_major: END_MAJOR.locate(&lowered)?,
            urm: URM.locate(&lowered)?,
            admission: ADMISSION.locate(&lowered)?,
            headcount: HEADCOUNT.locate(&lowered)?,
        })
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8. A leading byte order mark is
/// dropped so it cannot stick to the first header.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()
        }
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(codec) => codec.decode(bytes).0.to_string(),
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };
    decoded.trim_start_matches('\u{feff}').to_string()
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse a headcount cell. Integral floats (`"12.0"`) are accepted since
/// spreadsheet exports often write counts that way.
fn parse_headcount(value: &str, line: u64) -> CsvResult<u64> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Ok(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(CsvError::InvalidHeadcount { line, value: value.to_string() }),
    }
}

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse CSV from a reader with an explicit delimiter.
///
/// Returns the headers and rows.
pub fn parse_records<R: Read>(reader: R, delimiter: char) -> CsvResult<(Vec<String>, Vec<RawRecord>)> {
    if !delimiter.is_ascii() {
        return Err(CsvError::ParseError(format!("delimiter '{}' is not ASCII", delimiter)));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }
    let columns = ColumnMap::resolve(&headers)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| row.get(idx).unwrap_or("");

        records.push(RawRecord {
            cohort: cell(columns.cohort).to_string(),
            start_major: cell(columns.start_major).to_string(),
            end_major: optional(cell(columns.end_major)),
            urm: optional(cell(columns.urm)),
            admission_type: cell(columns.admission).to_string(),
            headcount: parse_headcount(cell(columns.headcount), line)?,
            line: Some(line),
        });
    }

    Ok((headers, records))
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Vec<RawRecord>> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    parse_records(content.as_bytes(), delimiter).map(|(_, records)| records)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_records(content.as_bytes(), delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("raw_data.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.records.len());
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "cohort,cohort_major_desc,deg_major_desc,urm,freshman_transfer,headcount";

    #[test]
    fn test_simple_csv() {
        let csv = format!("{}\n2014-15,Physics,Physics,Non-URM,Freshman,10\n", HEADER);
        let rows = parse_str(&csv, ',').unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cohort, "2014-15");
        assert_eq!(rows[0].start_major, "Physics");
        assert_eq!(rows[0].end_major.as_deref(), Some("Physics"));
        assert_eq!(rows[0].urm.as_deref(), Some("Non-URM"));
        assert_eq!(rows[0].headcount, 10);
    }

    #[test]
    fn test_empty_cells_become_none() {
        let csv = format!("{}\n2014-15,Physics,,,Transfer,5\n", HEADER);
        let rows = parse_str(&csv, ',').unwrap();

        assert_eq!(rows[0].end_major, None);
        assert_eq!(rows[0].urm, None);
    }

    #[test]
    fn test_quoted_values_with_delimiter_inside() {
        let csv = format!("{}\n2015,\"Design, Media Arts\",\"Physics\",URM,Freshman,2\n", HEADER);
        let rows = parse_str(&csv, ',').unwrap();
        assert_eq!(rows[0].start_major, "Design, Media Arts");
    }

    #[test]
    fn test_header_aliases_case_insensitive() {
        let csv = "Cohort;START_MAJ;End_Maj;URM;Fresh;Headcount\n2016;math;;urm;transfer;4\n";
        let rows = parse_str(csv, ';').unwrap();
        assert_eq!(rows[0].start_major, "math");
        assert_eq!(rows[0].headcount, 4);
    }

    #[test]
    fn test_missing_column() {
        let csv = "cohort,start_maj,end_maj,urm,headcount\n2014,a,b,urm,1\n";
        let err = parse_str(csv, ',').unwrap_err();
        match err {
            CsvError::MissingColumn { field, .. } => assert_eq!(field, "admission type"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_headcount() {
        let csv = format!("{}\n2014,a,b,urm,freshman,-3\n", HEADER);
        let err = parse_str(&csv, ',').unwrap_err();
        assert!(matches!(err, CsvError::InvalidHeadcount { line: 2, .. }));
    }

    #[test]
    fn test_integral_float_headcount() {
        assert_eq!(parse_headcount("12.0", 1).unwrap(), 12);
        assert!(parse_headcount("1.5", 1).is_err());
        assert!(parse_headcount("", 1).is_err());
    }

    #[test]
    fn test_blank_rows_skipped() {
        let csv = format!("{}\n2014,a,b,urm,freshman,1\n,,,,,\n2015,a,b,urm,freshman,2\n", HEADER);
        let rows = parse_str(&csv, ',').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_str("", ','), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes_auto(b"  \n"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let csv = format!("\u{feff}{}\n2014,physics,physics,urm,freshman,1\n", HEADER);
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.headers[0], "cohort");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_file_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, format!("{}\n2014,physics,,non-urm,freshman,5\n", HEADER)).unwrap();

        let result = parse_csv_file_auto(&path).unwrap();
        assert_eq!(result.records[0].headcount, 5);
    }
}
