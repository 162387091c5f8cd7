//! Property-aligned comparison of detail rows.

use crate::cell::Cell;
use crate::error::GridResult;
use crate::model::ResultModel;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

/// One property across every compared row.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyComparison {
    pub name: String,
    pub column: usize,
    /// One value per compared row, in row-selection order.
    pub values: Vec<Cell>,
    pub all_match: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonView {
    pub rows: Vec<usize>,
    pub properties: Vec<PropertyComparison>,
}

impl ComparisonView {
    pub fn mismatch_count(&self) -> usize {
        self.properties.iter().filter(|p| !p.all_match).count()
    }
}

/// Build the comparison of `rows`, properties in current column order.
///
/// Properties that share a name appear once, at the first column carrying it.
pub fn build_comparison(model: &ResultModel, rows: &[usize]) -> GridResult<ComparisonView> {
    for &row in rows {
        model.check_row(row)?;
    }

    let mut seen = HashSet::new();
    let mut properties = Vec::new();
    for (col, column) in model.columns().iter().enumerate() {
        if !seen.insert(column.name.as_str()) {
            continue;
        }
        let values: Vec<Cell> = rows
            .iter()
            .filter_map(|&row| model.cell(row, col).cloned())
            .collect();
        let mut normalized = values.iter().map(|c| normalize(&c.comparison_value()));
        let all_match = match normalized.next() {
            Some(first) => normalized.all(|v| v == first),
            None => true,
        };
        properties.push(PropertyComparison {
            name: column.name.clone(),
            column: col,
            values,
            all_match,
        });
    }

    Ok(ComparisonView {
        rows: rows.to_vec(),
        properties,
    })
}

/// Structural form used for equality: numbers as floats, object keys sorted,
/// and strings holding JSON documents parsed.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(fields) => {
            let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, field) in entries {
                sorted.insert(key.clone(), normalize(field));
            }
            Value::Object(sorted)
        }
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                    return normalize(&parsed);
                }
            }
            value.clone()
        }
        Value::Null | Value::Bool(_) => value.clone(),
    }
}
