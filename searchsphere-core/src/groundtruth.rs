//! Ground-truth documents for offline precision evaluation.
//!
//! A document maps queries to the chunk ids a human judged relevant. It is
//! either hand-authored, exported from the labeling view, or pasted into the
//! evaluation runner, so the accepted shapes are deliberately loose:
//!
//! - `{ "items": [...] }` and `{ "filters": ..., "items": [...] }` (k defaults to 10)
//! - `{ "k": 5, "filters": ..., "items": [...] }`
//! - any of the above nested under a top-level `"groundtruth"` key
//!
//! Everything is validated before the document is allowed anywhere near the
//! backend.

use crate::error::GroundTruthError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Precision cutoff used when the document does not carry a usable `k`.
pub const DEFAULT_K: u32 = 10;

/// One labeled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthItem {
    pub query: String,
    pub relevant_ids: Vec<String>,
}

impl GroundTruthItem {
    pub fn new(query: impl Into<String>, relevant_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            relevant_ids,
        }
    }
}

/// A validated evaluation document, in the canonical shape sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthDocument {
    pub k: u32,
    /// Passed through to the backend without inspection.
    pub filters: Value,
    pub items: Vec<GroundTruthItem>,
}

impl GroundTruthDocument {
    /// Build a document from labeled items, as the labeling view exports it.
    ///
    /// Still validates: an empty item list or a blank query is rejected.
    pub fn from_items(items: Vec<GroundTruthItem>) -> Result<Self, GroundTruthError> {
        let value = serde_json::json!({ "filters": null, "items": items });
        normalize(&value)
    }

    /// Override the precision cutoff. Zero is ignored.
    pub fn with_k(mut self, k: u32) -> Self {
        if k > 0 {
            self.k = k;
        }
        self
    }

    /// Number of labeled queries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a validated document.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Canonical JSON body for the precision endpoint.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "k": self.k,
            "filters": self.filters,
            "items": self.items,
        })
    }
}

/// Short JSON type name used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse raw pasted or uploaded text, then normalize it.
pub fn parse(text: &str) -> Result<GroundTruthDocument, GroundTruthError> {
    let value: Value = serde_json::from_str(text).map_err(|e| GroundTruthError::NotJson {
        message: e.to_string(),
    })?;
    normalize(&value)
}

/// Validate and canonicalize an evaluation document.
pub fn normalize(input: &Value) -> Result<GroundTruthDocument, GroundTruthError> {
    let mut obj = as_object(input)?;

    if let Some(nested) = obj.get("groundtruth") {
        obj = as_object(nested)?;
    }

    let items = match obj.get("items") {
        None => return Err(GroundTruthError::MissingItems),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(GroundTruthError::ItemsNotArray {
                found: type_name(other),
            });
        }
    };
    if items.is_empty() {
        return Err(GroundTruthError::EmptyItems);
    }

    let items = items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_item(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GroundTruthDocument {
        k: positive_k(obj.get("k")).unwrap_or(DEFAULT_K),
        filters: obj.get("filters").cloned().unwrap_or(Value::Null),
        items,
    })
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, GroundTruthError> {
    value.as_object().ok_or(GroundTruthError::NotAnObject {
        found: type_name(value),
    })
}

/// `k` is honored only when it is a positive whole number.
fn positive_k(value: Option<&Value>) -> Option<u32> {
    let Some(Value::Number(number)) = value else {
        return None;
    };
    if let Some(k) = number.as_u64() {
        return u32::try_from(k).ok().filter(|k| *k > 0);
    }
    let k = number.as_f64()?;
    if k >= 1.0 && k.fract() == 0.0 && k <= f64::from(u32::MAX) {
        Some(k as u32)
    } else {
        None
    }
}

fn normalize_item(index: usize, item: &Value) -> Result<GroundTruthItem, GroundTruthError> {
    let obj = item.as_object().ok_or(GroundTruthError::ItemNotObject {
        index,
        found: type_name(item),
    })?;

    let query = match obj.get("query") {
        Some(Value::String(q)) if !q.trim().is_empty() => q.clone(),
        _ => return Err(GroundTruthError::InvalidQuery { index }),
    };

    let ids = match obj.get("relevant_ids") {
        Some(Value::Array(ids)) => ids,
        other => {
            return Err(GroundTruthError::RelevantIdsNotArray {
                index,
                found: other.map(type_name).unwrap_or("nothing"),
            });
        }
    };

    let relevant_ids = ids
        .iter()
        .enumerate()
        .map(|(position, id)| match id {
            Value::String(s) => Ok(s.clone()),
            other => Err(GroundTruthError::RelevantIdNotString {
                index,
                position,
                found: type_name(other),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GroundTruthItem {
        query,
        relevant_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_minimal_document_gets_defaults() {
        let doc = normalize(&json!({
            "items": [{"query": "hybrid search", "relevant_ids": ["doc1::0"]}]
        }))
        .unwrap();
        assert_eq!(
            doc.to_json(),
            json!({
                "k": 10,
                "filters": null,
                "items": [{"query": "hybrid search", "relevant_ids": ["doc1::0"]}]
            })
        );
    }

    #[test]
    fn test_missing_items_is_named() {
        let err = normalize(&json!({})).unwrap_err();
        assert_eq!(err, GroundTruthError::MissingItems);
        assert!(err.to_string().contains("items"));
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = normalize(&json!({"filters": null, "items": []})).unwrap_err();
        assert_eq!(err, GroundTruthError::EmptyItems);
    }

    #[test]
    fn test_items_not_array() {
        let err = normalize(&json!({"items": {"query": "x"}})).unwrap_err();
        assert_eq!(err, GroundTruthError::ItemsNotArray { found: "object" });
    }

    #[test]
    fn test_non_object_input() {
        assert_eq!(
            normalize(&json!([1, 2])).unwrap_err(),
            GroundTruthError::NotAnObject { found: "array" }
        );
        assert_eq!(
            normalize(&json!("text")).unwrap_err(),
            GroundTruthError::NotAnObject { found: "string" }
        );
    }

    #[test]
    fn test_explicit_k_passes_through() {
        let doc = normalize(&json!({
            "k": 5,
            "filters": {"team": ["finops"]},
            "items": [{"query": "q", "relevant_ids": []}]
        }))
        .unwrap();
        assert_eq!(doc.k, 5);
        assert_eq!(doc.filters, json!({"team": ["finops"]}));
        assert!(doc.items[0].relevant_ids.is_empty());
    }

    #[test]
    fn test_unusable_k_defaults() {
        for k in [json!(0), json!(-3), json!(2.5), json!("7"), json!(null)] {
            let doc = normalize(&json!({
                "k": k,
                "items": [{"query": "q", "relevant_ids": ["a"]}]
            }))
            .unwrap();
            assert_eq!(doc.k, DEFAULT_K, "k = {k}");
        }
        let doc = normalize(&json!({"k": 3.0, "items": [{"query": "q", "relevant_ids": []}]}))
            .unwrap();
        assert_eq!(doc.k, 3);
    }

    #[test]
    fn test_groundtruth_wrapper_unwrapped() {
        let doc = normalize(&json!({
            "groundtruth": {
                "k": 20,
                "items": [{"query": "what is rrf", "relevant_ids": ["a::1", "b::2"]}]
            }
        }))
        .unwrap();
        assert_eq!(doc.k, 20);
        assert_eq!(doc.items[0].relevant_ids, vec!["a::1", "b::2"]);
    }

    #[test]
    fn test_groundtruth_wrapper_must_be_object() {
        let err = normalize(&json!({"groundtruth": []})).unwrap_err();
        assert_eq!(err, GroundTruthError::NotAnObject { found: "array" });
    }

    #[test]
    fn test_item_validation() {
        let err = normalize(&json!({"items": [{"query": "ok", "relevant_ids": []}, 3]}))
            .unwrap_err();
        assert_eq!(
            err,
            GroundTruthError::ItemNotObject {
                index: 1,
                found: "number"
            }
        );

        let err = normalize(&json!({"items": [{"query": "  ", "relevant_ids": []}]})).unwrap_err();
        assert_eq!(err, GroundTruthError::InvalidQuery { index: 0 });

        let err = normalize(&json!({"items": [{"relevant_ids": []}]})).unwrap_err();
        assert_eq!(err, GroundTruthError::InvalidQuery { index: 0 });

        let err = normalize(&json!({"items": [{"query": "q"}]})).unwrap_err();
        assert_eq!(
            err,
            GroundTruthError::RelevantIdsNotArray {
                index: 0,
                found: "nothing"
            }
        );

        let err =
            normalize(&json!({"items": [{"query": "q", "relevant_ids": "a"}]})).unwrap_err();
        assert_eq!(
            err,
            GroundTruthError::RelevantIdsNotArray {
                index: 0,
                found: "string"
            }
        );

        let err =
            normalize(&json!({"items": [{"query": "q", "relevant_ids": ["a", 7]}]})).unwrap_err();
        assert_eq!(
            err,
            GroundTruthError::RelevantIdNotString {
                index: 0,
                position: 1,
                found: "number"
            }
        );
    }

    #[test]
    fn test_malformed_filters_pass_through() {
        let doc = normalize(&json!({
            "filters": "not-a-filter-object",
            "items": [{"query": "q", "relevant_ids": []}]
        }))
        .unwrap();
        assert_eq!(doc.filters, json!("not-a-filter-object"));
    }

    #[test]
    fn test_parse_text() {
        let doc = parse(r#"{"items":[{"query":"a","relevant_ids":["x"]}]}"#).unwrap();
        assert_eq!(doc.len(), 1);

        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, GroundTruthError::NotJson { .. }));
    }

    #[test]
    fn test_from_items_and_with_k() {
        let doc = GroundTruthDocument::from_items(vec![GroundTruthItem::new(
            "q",
            vec!["id".into()],
        )])
        .unwrap()
        .with_k(0)
        .with_k(25);
        assert_eq!(doc.k, 25);
        assert_eq!(doc.filters, Value::Null);

        assert_eq!(
            GroundTruthDocument::from_items(Vec::new()).unwrap_err(),
            GroundTruthError::EmptyItems
        );
    }

    #[test]
    fn test_normalized_document_renormalizes_unchanged() {
        let doc = normalize(&json!({
            "groundtruth": {"k": 4, "filters": null, "items": [{"query": "q", "relevant_ids": ["a"]}]}
        }))
        .unwrap();
        assert_eq!(normalize(&doc.to_json()).unwrap(), doc);
    }
}
