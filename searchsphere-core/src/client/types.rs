//! Request and response shapes exchanged with the gateway.
//!
//! Search hits arrive either in the normalized shape or in the older
//! Elasticsearch-style shape; the accessors on [`SearchHit`] prefer the
//! normalized fields and fall back to the legacy ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder query sent when the user searches with an empty box.
pub const MATCH_ALL_QUERY: &str = "*";

/// Maximum snippet length, in characters, taken from a legacy `_source.text`.
pub const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<Vec<String>>,
    /// ISO date lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.team.as_ref().is_none_or(Vec::is_empty)
            && self.doc_type.as_ref().is_none_or(Vec::is_empty)
            && self.since.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

/// Body of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: None,
            filters: None,
        }
    }

    pub fn with_k(mut self, k: u32) -> Self {
        self.k = Some(k);
        self
    }

    /// Attach filters; empty filters are dropped.
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = (!filters.is_empty()).then_some(filters);
        self
    }

    /// A blank query becomes the match-all placeholder.
    pub(crate) fn effective(&self) -> Self {
        let mut request = self.clone();
        if request.query.trim().is_empty() {
            request.query = MATCH_ALL_QUERY.to_string();
        }
        request
    }
}

/// Chat requests share the search request shape.
pub type ChatRequest = SearchRequest;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySource {
    pub title: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub team: Option<String>,
    pub doc_type: Option<String>,
    pub page_num: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub text: Vec<String>,
}

/// One search result in either the normalized or the legacy shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub id: Option<String>,
    pub score: Option<f64>,
    pub index: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub team: Option<String>,
    pub doc_type: Option<String>,

    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    #[serde(rename = "_score", skip_serializing_if = "Option::is_none")]
    pub legacy_score: Option<f64>,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<LegacySource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

impl SearchHit {
    fn source_field<'a>(&'a self, pick: impl Fn(&'a LegacySource) -> Option<&'a String>) -> Option<&'a str> {
        self.source.as_ref().and_then(pick).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }

    pub fn title(&self) -> &str {
        non_blank(self.title.as_deref())
            .or_else(|| non_blank(self.source_field(|s| s.title.as_ref())))
            .or_else(|| non_blank(self.source_field(|s| s.doc_type.as_ref())))
            .or_else(|| non_blank(self.source_field(|s| s.team.as_ref())))
            .unwrap_or("Untitled")
    }

    /// Normalized snippet, then the first highlight, then a prefix of the
    /// legacy body text.
    pub fn snippet(&self) -> String {
        if let Some(snippet) = non_blank(self.snippet.as_deref()) {
            return snippet.to_string();
        }
        if let Some(first) = self
            .highlight
            .as_ref()
            .and_then(|h| h.text.first())
            .filter(|s| !s.is_empty())
        {
            return first.clone();
        }
        match self.source_field(|s| s.text.as_ref()).map(str::trim) {
            Some(text) if !text.is_empty() => text.chars().take(SNIPPET_CHARS).collect(),
            _ => "No snippet available.".to_string(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.source_field(|s| s.url.as_ref()))
    }

    pub fn team(&self) -> Option<&str> {
        self.team
            .as_deref()
            .or_else(|| self.source_field(|s| s.team.as_ref()))
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type
            .as_deref()
            .or_else(|| self.source_field(|s| s.doc_type.as_ref()))
    }

    pub fn score(&self) -> Option<f64> {
        self.score.or(self.legacy_score)
    }

    /// `team • doc_type • p.N`, skipping absent parts.
    pub fn meta(&self) -> Option<String> {
        let page = self
            .source
            .as_ref()
            .and_then(|s| s.page_num)
            .filter(|p| *p > 0)
            .map(|p| format!("p.{p}"));
        let parts: Vec<String> = [self.team(), self.doc_type()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .chain(page)
            .collect();
        (!parts.is_empty()).then(|| parts.join(" • "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub k: Option<u32>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    /// `bm25`, `knn`, `hybrid` or `demo`.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default, rename = "__latency_ms")]
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCitation {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<ChatCitation>,
    #[serde(default)]
    pub top_k_used: u32,
    #[serde(default, rename = "__latency_ms")]
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAssistRequest {
    pub query: String,
    pub k: u32,
}

/// A labeling candidate returned by label-assist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
    pub chunk_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub page_num: Option<u32>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    /// May contain `<em>` highlight markup.
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelAssistResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub k: u32,
    #[serde(default)]
    pub candidates: Vec<LabelCandidate>,
}

/// Result of a precision evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub k: u32,
    pub p_at_k: f64,
    /// Either a per-query breakdown or a plain count, depending on backend version.
    #[serde(default)]
    pub queries: Value,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl EvalResult {
    pub fn query_count(&self) -> usize {
        match &self.queries {
            Value::Array(list) => list.len(),
            Value::Number(n) => n.as_u64().map_or(0, |n| n as usize),
            _ => 0,
        }
    }
}
