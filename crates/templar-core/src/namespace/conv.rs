//! Type conversion functions: parse JSON/YAML/TOML/CSV text into values and serialize
//! values back to text.
//!
//! The CSV functions take an optional one-character delimiter as their first argument
//! (default `,`). `csvByRow` and `csvByColumn` also take an optional header row; without
//! one, the first record is the header.

use handlebars::JsonValue;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use super::{text_arg, to_text, HelperFn, StaticGroup};

type FnResult = std::result::Result<JsonValue, String>;

const FUNCS: &[(&str, HelperFn)] = &[
    ("bool", to_bool),
    ("has", has),
    ("json", json),
    ("jsonArray", json_array),
    ("yaml", yaml),
    ("yamlArray", yaml_array),
    ("toml", toml),
    ("csv", csv),
    ("csvByRow", csv_by_row),
    ("csvByColumn", csv_by_column),
    ("fromStrings", from_strings),
    ("toJSON", to_json),
    ("toJSONPretty", to_json_pretty),
    ("toYAML", to_yaml),
    ("toTOML", to_toml),
    ("toCSV", to_csv),
    ("slice", slice),
];

pub fn group() -> StaticGroup {
    StaticGroup::new("conv", FUNCS)
}

/// `"1"`, `"t"`, `"true"` (any case) are true; anything else is false.
fn to_bool(args: &[&JsonValue]) -> FnResult {
    if let Some(JsonValue::Bool(b)) = args.first().copied() {
        return Ok(JsonValue::Bool(*b));
    }
    let s = text_arg(args, 0)?;
    let truthy = matches!(s.to_ascii_lowercase().as_str(), "1" | "t" | "true");
    Ok(truthy.into())
}

/// `has map key`
fn has(args: &[&JsonValue]) -> FnResult {
    let map = args.first().ok_or("missing argument 1")?;
    let key = text_arg(args, 1)?;
    Ok(map.as_object().is_some_and(|m| m.contains_key(&key)).into())
}

fn json(args: &[&JsonValue]) -> FnResult {
    let value: JsonValue =
        serde_json::from_str(&text_arg(args, 0)?).map_err(|e| format!("invalid JSON: {e}"))?;
    expect_object(value)
}

fn json_array(args: &[&JsonValue]) -> FnResult {
    let value: JsonValue =
        serde_json::from_str(&text_arg(args, 0)?).map_err(|e| format!("invalid JSON: {e}"))?;
    expect_array(value)
}

fn yaml(args: &[&JsonValue]) -> FnResult {
    expect_object(parse_yaml(&text_arg(args, 0)?)?)
}

fn yaml_array(args: &[&JsonValue]) -> FnResult {
    expect_array(parse_yaml(&text_arg(args, 0)?)?)
}

fn toml(args: &[&JsonValue]) -> FnResult {
    parse_toml(&text_arg(args, 0)?)
}

/// `csv [delim] in`: every record as a list of strings.
fn csv(args: &[&JsonValue]) -> FnResult {
    let (delim, input) = match args.len() {
        0 => return Err("missing argument 1".into()),
        1 => (b',', text_arg(args, 0)?),
        _ => (delimiter(&text_arg(args, 0)?)?, text_arg(args, 1)?),
    };
    let records = read_csv(&input, delim)?;
    Ok(records.into())
}

/// `csvByRow [delim] [header] in`: one object per record, keyed by header.
fn csv_by_row(args: &[&JsonValue]) -> FnResult {
    let table = CsvTable::from_args(args)?;
    let rows = table
        .records
        .iter()
        .map(|record| {
            let row: serde_json::Map<String, JsonValue> = table
                .header
                .iter()
                .cloned()
                .zip(record.iter().cloned().map(JsonValue::String))
                .collect();
            JsonValue::Object(row)
        })
        .collect();
    Ok(JsonValue::Array(rows))
}

/// `csvByColumn [delim] [header] in`: one list of values per header column.
fn csv_by_column(args: &[&JsonValue]) -> FnResult {
    let table = CsvTable::from_args(args)?;
    let columns = table
        .header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values = table
                .records
                .iter()
                .map(|record| record[i].clone().into())
                .collect();
            (name.clone(), JsonValue::Array(values))
        })
        .collect();
    Ok(JsonValue::Object(columns))
}

/// `fromStrings list` (or `fromStrings a b ...`): every element as a string.
fn from_strings(args: &[&JsonValue]) -> FnResult {
    let items: Vec<JsonValue> = match args {
        [JsonValue::Array(list)] => list.iter().map(|v| to_text(v).into()).collect(),
        _ => args.iter().map(|v| to_text(v).into()).collect(),
    };
    Ok(JsonValue::Array(items))
}

fn to_json(args: &[&JsonValue]) -> FnResult {
    let value = args.first().ok_or("missing argument 1")?;
    Ok(value.to_string().into())
}

/// `toJSONPretty indent value`
fn to_json_pretty(args: &[&JsonValue]) -> FnResult {
    let indent = text_arg(args, 0)?;
    let value = args.get(1).ok_or("missing argument 2")?;

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|e| e.to_string())?;
    String::from_utf8(buf)
        .map(JsonValue::String)
        .map_err(|e| e.to_string())
}

fn to_yaml(args: &[&JsonValue]) -> FnResult {
    let value = args.first().ok_or("missing argument 1")?;
    serde_yaml::to_string(value)
        .map(JsonValue::String)
        .map_err(|e| format!("cannot encode YAML: {e}"))
}

fn to_toml(args: &[&JsonValue]) -> FnResult {
    let value = args.first().ok_or("missing argument 1")?;
    ::toml::to_string(value)
        .map(JsonValue::String)
        .map_err(|e| format!("cannot encode TOML: {e}"))
}

/// `toCSV [delim] rows`: rows of cells to CSV text with CRLF line endings.
fn to_csv(args: &[&JsonValue]) -> FnResult {
    let (delim, rows) = match args {
        [] => return Err("missing argument 1".into()),
        [rows] => (b',', *rows),
        [delim, rows, ..] => (delimiter(&to_text(delim))?, *rows),
    };
    let rows = rows
        .as_array()
        .ok_or_else(|| format!("toCSV expects a list of rows, got {rows}"))?;

    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(delim)
        .terminator(::csv::Terminator::CRLF)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        let cells: Vec<String> = match row {
            JsonValue::Array(cells) => cells.iter().map(to_text).collect(),
            other => return Err(format!("toCSV row is not a list: {other}")),
        };
        writer
            .write_record(&cells)
            .map_err(|e| format!("cannot encode CSV: {e}"))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| format!("cannot encode CSV: {e}"))?;
    String::from_utf8(bytes)
        .map(JsonValue::String)
        .map_err(|e| e.to_string())
}

fn slice(args: &[&JsonValue]) -> FnResult {
    Ok(JsonValue::Array(args.iter().map(|v| (*v).clone()).collect()))
}

// -------------------------------------------------------
// Parsers shared with the data group
// -------------------------------------------------------

pub(crate) fn parse_yaml(text: &str) -> FnResult {
    serde_yaml::from_str(text).map_err(|e| format!("invalid YAML: {e}"))
}

pub(crate) fn parse_toml(text: &str) -> FnResult {
    let table: ::toml::Table =
        ::toml::from_str(text).map_err(|e| format!("invalid TOML: {e}"))?;
    serde_json::to_value(table).map_err(|e| e.to_string())
}

fn delimiter(text: &str) -> std::result::Result<u8, String> {
    match text.as_bytes() {
        [b] => Ok(*b),
        _ => Err(format!("CSV delimiter must be a single byte, got {text:?}")),
    }
}

fn read_csv(text: &str, delim: u8) -> std::result::Result<Vec<Vec<String>>, String> {
    ::csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delim)
        .from_reader(text.as_bytes())
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| format!("invalid CSV: {e}"))
        })
        .collect()
}

/// Parsed CSV with a resolved header, for the by-row and by-column views.
struct CsvTable {
    header: Vec<String>,
    records: Vec<Vec<String>>,
}

impl CsvTable {
    fn from_args(args: &[&JsonValue]) -> std::result::Result<Self, String> {
        let (delim, header, input) = match args.len() {
            0 => return Err("missing argument 1".into()),
            1 => (b',', None, text_arg(args, 0)?),
            2 => (delimiter(&text_arg(args, 0)?)?, None, text_arg(args, 1)?),
            _ => (
                delimiter(&text_arg(args, 0)?)?,
                Some(text_arg(args, 1)?).filter(|h| !h.is_empty()),
                text_arg(args, 2)?,
            ),
        };

        let mut records = read_csv(&input, delim)?;
        let header = match header {
            Some(header) => read_csv(&header, delim)?.into_iter().next().unwrap_or_default(),
            None if records.is_empty() => Vec::new(),
            None => records.remove(0),
        };
        if let Some((i, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != header.len())
        {
            return Err(format!(
                "CSV record {} has {} fields, header has {}",
                i + 1,
                record.len(),
                header.len()
            ));
        }
        Ok(Self { header, records })
    }
}

fn expect_object(value: JsonValue) -> FnResult {
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("expected an object, got {value}"))
    }
}

fn expect_array(value: JsonValue) -> FnResult {
    if value.is_array() {
        Ok(value)
    } else {
        Err(format!("expected an array, got {value}"))
    }
}
