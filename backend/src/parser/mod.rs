//! Typed table loader.
//!
//! Turns delimited text (or already-decoded JSON rows) into a [`RecordSet`]
//! given a header, one type tag per column and a number of leading rows to
//! skip. Coercion never fails: a cell that does not parse as its declared
//! numeric type becomes [`Field::Missing`], so short or malformed trailing
//! rows degrade instead of aborting the load.
//!
//! Also provides encoding and delimiter detection for text read from disk,
//! and an untyped conversion for JSON inputs that are already records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::str::FromStr;

use crate::error::{LoadError, LoadResult};
use crate::logs::log_warning;
use crate::models::{Field, Record, RecordSet};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    String,
}

impl FromStr for ColumnType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int" => Ok(ColumnType::Int),
            "float" => Ok(ColumnType::Float),
            "string" => Ok(ColumnType::String),
            other => Err(LoadError::UnknownType(other.to_string())),
        }
    }
}

impl ColumnType {
    /// Coerce a raw cell to this type.
    ///
    /// Numeric types accept a leading numeric prefix the way a lenient parse
    /// does (`"12abc"` -> 12, `"3.7"` -> 3 as int, `"2.5x"` -> 2.5 as float).
    pub fn coerce(self, raw: &str) -> Field {
        let raw = raw.trim();
        match self {
            ColumnType::String => Field::Text(raw.to_string()),
            ColumnType::Float => parse_float_prefix(raw).map(Field::Float).unwrap_or(Field::Missing),
            ColumnType::Int => parse_int_prefix(raw).map(Field::Int).unwrap_or(Field::Missing),
        }
    }

    /// Coerce a JSON cell to this type.
    pub fn coerce_json(self, value: &Value) -> Field {
        match (self, value) {
            (_, Value::Null) => Field::Missing,
            (ColumnType::String, Value::String(s)) => Field::Text(s.clone()),
            (ColumnType::String, other) => Field::Text(other.to_string()),
            (ColumnType::Float, Value::Number(n)) => n.as_f64().map(Field::Float).unwrap_or(Field::Missing),
            (ColumnType::Int, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .map(Field::Int)
                .unwrap_or(Field::Missing),
            (ty, Value::String(s)) => ty.coerce(s),
            _ => Field::Missing,
        }
    }
}

fn parse_int_prefix(raw: &str) -> Option<i64> {
    let bytes = raw.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    raw[..end].parse().ok()
}

fn parse_float_prefix(raw: &str) -> Option<f64> {
    let bytes = raw.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let int_end = digits(end);
    let mut mantissa = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits(end + 1);
        if mantissa || frac_end > end + 1 {
            mantissa = true;
            end = frac_end;
        }
    }
    if !mantissa {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'-') | Some(b'+')) {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    raw[..end].parse().ok()
}

/// Column layout of a delimited table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Field names, in column order.
    pub header: Vec<String>,
    /// One type tag per header field.
    pub types: Vec<ColumnType>,
    /// Leading rows to drop (typically 1 for an in-file header line).
    #[serde(default)]
    pub skip: usize,
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

impl TableSchema {
    pub fn new<S: Into<String>>(
        header: impl IntoIterator<Item = S>,
        types: impl IntoIterator<Item = ColumnType>,
    ) -> LoadResult<Self> {
        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        let types: Vec<ColumnType> = types.into_iter().collect();
        if header.len() != types.len() {
            return Err(LoadError::SchemaMismatch {
                header: header.len(),
                types: types.len(),
            });
        }
        Ok(Self {
            header,
            types,
            skip: 0,
            delimiter: default_delimiter(),
        })
    }

    pub fn skip(mut self, rows: usize) -> Self {
        self.skip = rows;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn columns(&self) -> impl Iterator<Item = (&String, ColumnType)> {
        self.header.iter().zip(self.types.iter().copied())
    }

    /// Build a record from positional raw cells. Absent cells are missing.
    fn record_from_cells<'a>(&self, mut cells: impl Iterator<Item = &'a str>) -> Record {
        self.columns()
            .map(|(name, ty)| {
                let value = cells.next().map(|c| ty.coerce(c)).unwrap_or(Field::Missing);
                (name.clone(), value)
            })
            .collect()
    }
}

/// Load delimited text into typed records.
///
/// # Example
/// ```ignore
/// use rossvis::parser::{load_delimited, ColumnType, TableSchema};
///
/// let schema = TableSchema::new(["PE_ID", "KP_ID"], [ColumnType::Int, ColumnType::Int])?.skip(1);
/// let records = load_delimited("PE_ID,KP_ID\n0,1\n", &schema)?;
/// assert_eq!(records[0].number("KP_ID"), Some(1.0));
/// ```
pub fn load_delimited(text: &str, schema: &TableSchema) -> LoadResult<RecordSet> {
    // One record per input line: the csv reader drops blank lines, which
    // would shift both `skip` and the row count.
    text.lines()
        .skip(schema.skip)
        .map(|line| -> LoadResult<Record> {
            if line.trim().is_empty() {
                return Ok(schema.record_from_cells(std::iter::empty::<&str>()));
            }
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .delimiter(delimiter_byte(schema.delimiter))
                .from_reader(line.as_bytes());
            let mut row = csv::StringRecord::new();
            reader.read_record(&mut row)?;
            Ok(schema.record_from_cells(row.iter()))
        })
        .collect()
}

/// Load JSON rows (positional arrays or objects keyed by header name) into
/// typed records.
pub fn load_json_rows(rows: &[Value], schema: &TableSchema) -> LoadResult<RecordSet> {
    rows.iter()
        .enumerate()
        .skip(schema.skip)
        .map(|(i, row)| match row {
            Value::Array(cells) => Ok(schema
                .columns()
                .enumerate()
                .map(|(c, (name, ty))| {
                    let value = cells.get(c).map(|v| ty.coerce_json(v)).unwrap_or(Field::Missing);
                    (name.clone(), value)
                })
                .collect::<Record>()),
            Value::Object(obj) => Ok(schema
                .columns()
                .map(|(name, ty)| {
                    let value = obj.get(name).map(|v| ty.coerce_json(v)).unwrap_or(Field::Missing);
                    (name.clone(), value)
                })
                .collect::<Record>()),
            _ => Err(LoadError::NotARow(i)),
        })
        .collect()
}

/// Convert already-structured JSON objects into records without a schema.
///
/// Numbers, strings, numeric arrays and nulls map directly; nested objects
/// are flattened into dotted field names (`all.events_processed`).
pub fn records_from_json(rows: &[Value]) -> LoadResult<RecordSet> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row.as_object().ok_or(LoadError::NotARow(i))?;
            let mut record = Record::new();
            flatten_into(&mut record, "", obj)?;
            Ok(record)
        })
        .collect()
}

fn flatten_into(record: &mut Record, prefix: &str, obj: &Map<String, Value>) -> LoadResult<()> {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(record, &name, inner)?,
            other => {
                let field = json_field(&name, other)?;
                record.set(name, field);
            }
        }
    }
    Ok(())
}

fn json_field(name: &str, value: &Value) -> LoadResult<Field> {
    match value {
        Value::Null => Ok(Field::Missing),
        Value::Bool(b) => Ok(Field::Int(i64::from(*b))),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Field::Int)
            .or_else(|| n.as_f64().map(Field::Float))
            .unwrap_or(Field::Missing)),
        Value::String(s) => Ok(Field::Text(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
                Value::Null => Ok(f64::NAN),
                _ => Err(LoadError::UnsupportedValue {
                    field: name.to_string(),
                    message: "arrays must contain only numbers".to_string(),
                }),
            })
            .collect::<LoadResult<Vec<f64>>>()
            .map(Field::Vector),
        Value::Object(_) => Err(LoadError::UnsupportedValue {
            field: name.to_string(),
            message: "nested object".to_string(),
        }),
    }
}

fn delimiter_byte(delimiter: char) -> u8 {
    u8::try_from(delimiter).unwrap_or(b',')
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "iso-8859-1" | "latin-1" | "latin1" => Ok(encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()),
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()),
        other => encoding_rs::Encoding::for_label(other.as_bytes())
            .map(|enc| enc.decode(bytes).0.into_owned())
            .ok_or_else(|| LoadError::Encoding(format!("unsupported encoding '{}'", encoding))),
    }
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

/// Decode raw bytes from disk: detect the encoding, then decode.
///
/// A charset chardet reports but encoding_rs does not know falls back to
/// lossy UTF-8.
pub fn decode_auto(bytes: &[u8]) -> LoadResult<String> {
    let encoding = detect_encoding(bytes);
    match decode_content(bytes, &encoding) {
        Err(LoadError::Encoding(message)) => {
            log_warning(format!("{}, decoding as UTF-8", message));
            decode_content(bytes, "utf-8")
        }
        other => other,
    }
}

/// Read and decode a text file.
pub fn read_text_file<P: AsRef<Path>>(path: P) -> LoadResult<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router_schema() -> TableSchema {
        TableSchema::new(
            ["PE_ID", "KP_ID", "LP_ID", "routers_per_kp"],
            [ColumnType::Int; 4],
        )
        .unwrap()
        .skip(1)
    }

    #[test]
    fn test_typed_rows() {
        let text = "PE_ID,KP_ID,LP_ID,routers_per_kp\n0,1,4,1\n1,0,8,0\n";
        let records = load_delimited(text, &router_schema()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("KP_ID"), Some(&Field::Int(1)));
        assert_eq!(records[1].get("LP_ID"), Some(&Field::Int(8)));
    }

    #[test]
    fn test_malformed_cells_become_missing() {
        let text = "h\n0,x,4\n2";
        let records = load_delimited(text, &router_schema()).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].get("KP_ID").unwrap().is_missing());
        assert!(records[0].get("routers_per_kp").unwrap().is_missing());
        assert_eq!(records[1].number("PE_ID"), Some(2.0));
        assert!(records[1].get("LP_ID").unwrap().is_missing());
    }

    #[test]
    fn test_int_prefix_coercion() {
        assert_eq!(ColumnType::Int.coerce("12abc"), Field::Int(12));
        assert_eq!(ColumnType::Int.coerce("3.7"), Field::Int(3));
        assert_eq!(ColumnType::Int.coerce(" -4 "), Field::Int(-4));
        assert_eq!(ColumnType::Int.coerce("abc"), Field::Missing);
        assert_eq!(ColumnType::Float.coerce("2.5"), Field::Float(2.5));
        assert_eq!(ColumnType::Float.coerce("2.5x"), Field::Float(2.5));
        assert_eq!(ColumnType::Float.coerce("-1e3ms"), Field::Float(-1000.0));
        assert_eq!(ColumnType::Float.coerce(".5"), Field::Float(0.5));
        assert_eq!(ColumnType::Float.coerce("7e"), Field::Float(7.0));
        assert_eq!(ColumnType::Float.coerce("x2.5"), Field::Missing);
        assert_eq!(ColumnType::Float.coerce("-."), Field::Missing);
        assert_eq!(ColumnType::Float.coerce(""), Field::Missing);
        assert_eq!(ColumnType::String.coerce(" router "), Field::Text("router".into()));
    }

    #[test]
    fn test_blank_lines_become_missing_rows() {
        let schema = TableSchema::new(["a", "b"], [ColumnType::Int; 2]).unwrap().skip(1);
        let records = load_delimited("a,b\n1,2\n\n3,4\n", &schema).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records[1].get("a").unwrap().is_missing());
        assert!(records[1].get("b").unwrap().is_missing());
        assert_eq!(records[2].number("b"), Some(4.0));

        // a leading blank line is what `skip` drops
        let records = load_delimited("\n1,2\r\n3,4", &schema).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number("a"), Some(1.0));
    }

    #[test]
    fn test_schema_mismatch() {
        let err = TableSchema::new(["a", "b"], [ColumnType::Int]).unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch { header: 2, types: 1 }));
    }

    #[test]
    fn test_column_type_from_str() {
        assert_eq!("Float".parse::<ColumnType>().unwrap(), ColumnType::Float);
        assert!("bool".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_semicolon_delimiter() {
        let schema = TableSchema::new(["LP_ID", "LP_type"], [ColumnType::Int, ColumnType::String])
            .unwrap()
            .delimiter(';');
        let records = load_delimited("0;server\n1;router", &schema).unwrap();
        assert_eq!(records[1].text("LP_type"), Some("router"));
    }

    #[test]
    fn test_json_rows() {
        let schema = TableSchema::new(["PE_ID", "LP_type"], [ColumnType::Int, ColumnType::String]).unwrap();
        let rows = vec![json!([1, "server"]), json!({"PE_ID": "2", "LP_type": "router"}), json!([null])];
        let records = load_json_rows(&rows, &schema).unwrap();

        assert_eq!(records[0].number("PE_ID"), Some(1.0));
        assert_eq!(records[1].number("PE_ID"), Some(2.0));
        assert!(records[2].get("PE_ID").unwrap().is_missing());
        assert!(records[2].get("LP_type").unwrap().is_missing());

        assert!(matches!(load_json_rows(&[json!(3)], &schema), Err(LoadError::NotARow(0))));
    }

    #[test]
    fn test_records_from_json_flattens() {
        let rows = vec![json!({
            "GVT": 100.5,
            "all": {"events_processed": 10, "events_rolled_back": 2},
            "remote_events": [1, 2, null]
        })];
        let records = records_from_json(&rows).unwrap();
        let r = &records[0];

        assert_eq!(r.number("GVT"), Some(100.5));
        assert_eq!(r.number("all.events_processed"), Some(10.0));
        match r.get("remote_events") {
            Some(Field::Vector(v)) => {
                assert_eq!(v.len(), 3);
                assert!(v[2].is_nan());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_records_from_json_rejects_text_arrays() {
        let rows = vec![json!({"names": ["a", "b"]})];
        assert!(matches!(
            records_from_json(&rows),
            Err(LoadError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        let bytes: &[u8] = &[0x72, 0x6F, 0x75, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.starts_with("rout"));
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert_eq!(decode_content(b"abc", "shift_jis").unwrap(), "abc");
        assert!(matches!(
            decode_content(b"abc", "not-a-charset"),
            Err(LoadError::Encoding(_))
        ));
        assert_eq!(decode_auto(b"PE_ID,KP_ID\n0,1\n").unwrap(), "PE_ID,KP_ID\n0,1\n");
    }
}
