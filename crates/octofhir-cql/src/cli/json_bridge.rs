//! Conversions between plain JSON and [`CqlValue`], used by the `execute`
//! and REPL commands to load `--data`/`--param` input and print results.
//!
//! `CqlValue` derives `Serialize`/`Deserialize` directly as a tagged Rust
//! enum, which is convenient for ELM round-tripping but not the shape a CLI
//! user expects from `--data patient.json`. These helpers bridge plain JSON
//! (objects, arrays, numbers, strings, booleans, null) to and from the value
//! model the evaluator actually runs on.

use crate::eval::DataProvider;
use crate::types::{
    CqlDate, CqlDateTime, CqlList, CqlQuantity, CqlTime, CqlTuple, CqlValue,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Convert a plain JSON value into a [`CqlValue`].
///
/// Strings prefixed with `@` are parsed as CQL temporal literals (date,
/// datetime, or time-of-day with `@T`); anything else that fails to parse as
/// a temporal literal is kept as a plain String. Objects become Tuples,
/// arrays become Lists.
pub fn json_to_cql_value(value: &Value) -> CqlValue {
    match value {
        Value::Null => CqlValue::Null,
        Value::Bool(b) => CqlValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    CqlValue::Integer(i as i32)
                } else {
                    CqlValue::Long(i)
                }
            } else if let Some(f) = n.as_f64() {
                Decimal::from_str(&f.to_string())
                    .map(CqlValue::Decimal)
                    .unwrap_or(CqlValue::Null)
            } else {
                CqlValue::Null
            }
        }
        Value::String(s) => parse_string_literal(s),
        Value::Array(items) => {
            CqlValue::List(CqlList::from_elements(items.iter().map(json_to_cql_value).collect()))
        }
        Value::Object(map) => CqlValue::Tuple(CqlTuple::from_elements(
            map.iter().map(|(k, v)| (k.clone(), json_to_cql_value(v))),
        )),
    }
}

/// Parse a JSON string into a temporal literal, a UCUM quantity, or a plain
/// String if neither applies.
fn parse_string_literal(s: &str) -> CqlValue {
    if let Some(rest) = s.strip_prefix("@T") {
        if let Some(time) = CqlTime::parse(rest) {
            return CqlValue::Time(time);
        }
    } else if let Some(rest) = s.strip_prefix('@') {
        if rest.contains('T') {
            if let Some(dt) = CqlDateTime::parse(rest) {
                return CqlValue::DateTime(dt);
            }
        }
        if let Some(date) = CqlDate::parse(rest) {
            return CqlValue::Date(date);
        }
    }

    if let Some((value, unit)) = s.split_once(' ') {
        if let Ok(decimal) = Decimal::from_str(value) {
            let unit = unit.trim().trim_matches('\'');
            if !unit.is_empty() {
                return CqlValue::Quantity(CqlQuantity {
                    value: decimal,
                    unit: Some(unit.to_string()),
                });
            }
        }
    }

    CqlValue::String(s.to_string())
}

/// Convert a [`CqlValue`] into a plain JSON value for CLI output.
pub fn cql_value_to_json(value: &CqlValue) -> Value {
    match value {
        CqlValue::Null => Value::Null,
        CqlValue::Boolean(b) => Value::Bool(*b),
        CqlValue::Integer(i) => Value::from(*i),
        CqlValue::Long(l) => Value::from(*l),
        CqlValue::Decimal(d) => serde_json::Number::from_str(&d.to_string())
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(d.to_string())),
        CqlValue::String(s) => Value::String(s.clone()),
        CqlValue::Date(d) => Value::String(d.to_string()),
        CqlValue::DateTime(dt) => Value::String(dt.to_string()),
        CqlValue::Time(t) => Value::String(t.to_string()),
        CqlValue::Quantity(q) => serde_json::json!({
            "value": q.value.to_string(),
            "unit": q.unit,
        }),
        CqlValue::Ratio(r) => serde_json::json!({
            "numerator": cql_value_to_json(&CqlValue::Quantity(r.numerator.clone())),
            "denominator": cql_value_to_json(&CqlValue::Quantity(r.denominator.clone())),
        }),
        CqlValue::Code(c) => serde_json::json!({
            "code": c.code,
            "system": c.system,
            "version": c.version,
            "display": c.display,
        }),
        CqlValue::Concept(c) => serde_json::json!({
            "codes": c.codes.iter().map(|code| cql_value_to_json(&CqlValue::Code(code.clone()))).collect::<Vec<_>>(),
            "display": c.display,
        }),
        CqlValue::List(l) => Value::Array(l.elements.iter().map(cql_value_to_json).collect()),
        CqlValue::Interval(i) => serde_json::json!({
            "low": i.low.as_ref().map(|v| cql_value_to_json(v)),
            "lowClosed": i.low_closed,
            "high": i.high.as_ref().map(|v| cql_value_to_json(v)),
            "highClosed": i.high_closed,
        }),
        CqlValue::Tuple(t) => Value::Object(
            t.elements
                .iter()
                .map(|(k, v)| (k.clone(), cql_value_to_json(v)))
                .collect(),
        ),
    }
}

/// A [`DataProvider`] backed by resources loaded from a `--data` JSON file.
///
/// Resources are matched against `[ResourceType: ...]` retrieves by a
/// top-level `"resourceType"` field (FHIR convention), compared
/// case-insensitively. Property access is plain Tuple field lookup.
pub struct JsonDataProvider {
    resources: Vec<CqlValue>,
}

impl JsonDataProvider {
    /// Build a provider from a single resource or a JSON array of resources.
    pub fn new(data: &Value) -> Self {
        let resources = match data {
            Value::Array(items) => items.iter().map(json_to_cql_value).collect(),
            other => vec![json_to_cql_value(other)],
        };
        Self { resources }
    }

    /// The `resourceType` of the first loaded resource, if present, used as
    /// the default evaluation context (e.g. `Patient`) when the caller
    /// doesn't specify one explicitly.
    pub fn primary_context_type(&self) -> Option<String> {
        self.resources.iter().find_map(|r| match r {
            CqlValue::Tuple(t) => t.get("resourceType").and_then(|v| match v {
                CqlValue::String(s) => Some(s.clone()),
                _ => None,
            }),
            _ => None,
        })
    }

    /// The first loaded resource, used as the `context` value.
    pub fn primary_resource(&self) -> Option<CqlValue> {
        self.resources.first().cloned()
    }
}

impl DataProvider for JsonDataProvider {
    fn retrieve(
        &self,
        data_type: &str,
        _context_type: Option<&str>,
        _context_value: Option<&CqlValue>,
        _template_id: Option<&str>,
        _code_property: Option<&str>,
        _codes: Option<&CqlValue>,
        _date_property: Option<&str>,
        _date_range: Option<&CqlValue>,
    ) -> Vec<CqlValue> {
        self.resources
            .iter()
            .filter(|r| match r {
                CqlValue::Tuple(t) => t
                    .get("resourceType")
                    .and_then(|v| match v {
                        CqlValue::String(s) => Some(s.eq_ignore_ascii_case(data_type)),
                        _ => None,
                    })
                    .unwrap_or(false),
                _ => false,
            })
            .cloned()
            .collect()
    }

    fn get_property(&self, resource: &CqlValue, path: &str) -> Option<CqlValue> {
        match resource {
            CqlValue::Tuple(tuple) => tuple.get(path).cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_primitives() {
        assert_eq!(json_to_cql_value(&Value::Null), CqlValue::Null);
        assert_eq!(json_to_cql_value(&serde_json::json!(true)), CqlValue::Boolean(true));
        assert_eq!(json_to_cql_value(&serde_json::json!(42)), CqlValue::Integer(42));
        assert_eq!(
            json_to_cql_value(&serde_json::json!("hello")),
            CqlValue::String("hello".to_string())
        );
    }

    #[test]
    fn converts_temporal_literal() {
        let value = json_to_cql_value(&serde_json::json!("@2024-01-15"));
        assert!(matches!(value, CqlValue::Date(_)));
    }

    #[test]
    fn round_trips_tuple_and_list() {
        let input = serde_json::json!({
            "resourceType": "Patient",
            "active": true,
            "tags": [1, 2, 3]
        });
        let cql = json_to_cql_value(&input);
        let back = cql_value_to_json(&cql);
        assert_eq!(back["resourceType"], serde_json::json!("Patient"));
        assert_eq!(back["active"], serde_json::json!(true));
        assert_eq!(back["tags"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn data_provider_matches_resource_type() {
        let provider = JsonDataProvider::new(&serde_json::json!([
            {"resourceType": "Patient", "id": "1"},
            {"resourceType": "Observation", "id": "2"}
        ]));
        let results = provider.retrieve(
            "Observation", None, None, None, None, None, None, None,
        );
        assert_eq!(results.len(), 1);
    }
}
