use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::builder::ResultSet;
use super::city::CityTable;
use super::export::ExportConfig;
use super::index::RecordIndex;
use super::model::{AttributeValue, EntryKind, Record};
use super::search::SearchConfig;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load antigen or serum records from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `[{ "id": "...", "long": "...", ...fields }, ...]`
/// * `.csv`  – header row with at least `id` and `long` columns
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json_records(path),
        "csv" => load_csv_records(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load records and index them in one go.
pub fn load_index(
    path: &Path,
    kind: EntryKind,
    cities: &CityTable,
    config: SearchConfig,
) -> Result<RecordIndex> {
    let records = load_records(path)?;
    let index = RecordIndex::build(kind, records, cities, config)
        .with_context(|| format!("indexing {kind} records from {}", path.display()))?;
    log::info!("Loaded {} {kind} entries from {}", index.len(), path.display());
    Ok(index)
}

/// Read a results document without interpreting its layout.
pub fn load_results_document(path: &Path) -> Result<JsonValue> {
    let text = std::fs::read_to_string(path).context("reading results file")?;
    serde_json::from_str(&text).context("parsing results JSON")
}

/// Pick one result set out of a results document.
///
/// Documents are either a single result set object, or a list of experiments
/// each holding a `results` list: `[{ "results": [ {...}, ... ] }, ...]`.
pub fn select_result_set(doc: &JsonValue, experiment: usize, result: usize) -> Result<ResultSet> {
    let node = match doc {
        JsonValue::Object(obj) if obj.contains_key("titers") => doc,
        JsonValue::Array(experiments) => {
            let exp = experiments
                .get(experiment)
                .with_context(|| format!("no experiment {experiment} in results document"))?;
            exp.get("results")
                .and_then(|r| r.as_array())
                .with_context(|| format!("experiment {experiment} has no `results` list"))?
                .get(result)
                .with_context(|| format!("experiment {experiment} has no result {result}"))?
        }
        _ => bail!("Expected a result set object or a list of experiments"),
    };
    serde_json::from_value(node.clone())
        .with_context(|| format!("decoding result {result} of experiment {experiment}"))
}

/// Read an export configuration; missing keys take their defaults.
pub fn load_export_config(path: &Path) -> Result<ExportConfig> {
    let text = std::fs::read_to_string(path).context("reading export config")?;
    serde_json::from_str(&text).context("parsing export config")
}

/// Read a city table stored as `{ "HK": "HONG-KONG", ... }`.
pub fn load_city_table(path: &Path) -> Result<CityTable> {
    let text = std::fs::read_to_string(path).context("reading city table")?;
    let map: BTreeMap<String, String> = serde_json::from_str(&text).context("parsing city table")?;
    Ok(CityTable::from_pairs(
        map.iter().map(|(abb, name)| (abb.as_str(), name.as_str())),
    ))
}

// ---------------------------------------------------------------------------
// JSON records
// ---------------------------------------------------------------------------

fn load_json_records(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    json_records(&root)
}

/// Convert a JSON array of objects into records.
pub fn json_records(root: &JsonValue) -> Result<Vec<Record>> {
    let items = root.as_array().context("Expected top-level JSON array")?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item
                .as_object()
                .with_context(|| format!("Record {i} is not a JSON object"))?;
            Ok(obj
                .iter()
                .map(|(key, val)| (key.clone(), json_to_attribute(val)))
                .collect())
        })
        .collect()
}

fn json_to_attribute(val: &JsonValue) -> AttributeValue {
    match val {
        JsonValue::String(s) => AttributeValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                AttributeValue::Float(f)
            } else {
                AttributeValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Array(items) => AttributeValue::List(items.iter().map(json_to_attribute).collect()),
        JsonValue::Object(obj) => AttributeValue::Map(
            obj.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// CSV records
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Empty cells are dropped rather than stored as nulls.
fn load_csv_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    for required in ["id", "long"] {
        if !headers.iter().any(|h| h == required) {
            bail!("CSV missing '{required}' column");
        }
    }

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), guess_attribute_type(name, value)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Identifier-like columns always stay text so `007` keeps its zeros.
fn guess_attribute_type(column: &str, s: &str) -> AttributeValue {
    if matches!(column, "id" | "long" | "strain_id" | "parent_id" | "passage") {
        return AttributeValue::String(s.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return AttributeValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return AttributeValue::Float(f);
    }
    if s == "true" || s == "false" {
        return AttributeValue::Bool(s == "true");
    }
    AttributeValue::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_records_keep_nested_values() {
        let root = json!([
            { "id": "A1", "long": "A/PERTH/16/2009", "year": 2009, "meta": { "clade": "3C" } },
        ]);
        let records = json_records(&root).unwrap();
        assert_eq!(records[0]["year"], AttributeValue::Integer(2009));
        assert!(matches!(records[0]["meta"], AttributeValue::Map(_)));
    }

    #[test]
    fn json_records_reject_non_objects() {
        let err = json_records(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("Record 0"));
    }

    #[test]
    fn select_result_set_walks_experiments() {
        let doc = json!([
            { "results": [
                { "file": "a.csv", "antigen_ids": ["A1"], "serum_ids": ["S1"], "titers": [["40"]] },
                { "file": "b.csv", "antigen_ids": ["A2"], "serum_ids": ["S1"], "titers": [["<10"]] }
            ]}
        ]);
        let set = select_result_set(&doc, 0, 1).unwrap();
        assert_eq!(set.file.as_deref(), Some("b.csv"));
        assert!(select_result_set(&doc, 1, 0).is_err());
        assert!(select_result_set(&doc, 0, 2).is_err());
    }

    #[test]
    fn guess_keeps_identifier_columns_as_text() {
        assert_eq!(guess_attribute_type("id", "007"), AttributeValue::from("007"));
        assert_eq!(guess_attribute_type("year", "2009"), AttributeValue::Integer(2009));
        assert_eq!(guess_attribute_type("wildtype", "true"), AttributeValue::Bool(true));
    }
}
