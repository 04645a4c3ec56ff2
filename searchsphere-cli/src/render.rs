//! Plain-text rendering of gateway responses for the terminal.

use searchsphere_core::client::{ChatResponse, EvalResult, LabelAssistResponse, SearchResponse};
use searchsphere_core::poller::{EvalSummary, MetricsPoller, MetricsSource, StageLatency};
use std::fmt::Write;
use std::time::Duration;

fn latency_suffix(latency_ms: Option<f64>) -> String {
    latency_ms
        .map(|ms| format!(" ({ms:.0} ms)"))
        .unwrap_or_default()
}

pub fn search_results(response: &SearchResponse) -> String {
    let mut out = String::new();
    let mode = response.mode.as_deref().unwrap_or("unknown");
    let _ = writeln!(
        out,
        "{} result(s), mode {}{}",
        response.results.len(),
        mode,
        latency_suffix(response.latency_ms)
    );

    for (rank, hit) in response.results.iter().enumerate() {
        let score = hit
            .score()
            .map(|s| format!(" [{s:.2}]"))
            .unwrap_or_default();
        let _ = writeln!(out, "\n{:>2}. {}{}", rank + 1, hit.title(), score);
        if let Some(meta) = hit.meta() {
            let _ = writeln!(out, "    {meta}");
        }
        if let Some(url) = hit.url() {
            let _ = writeln!(out, "    {url}");
        }
        let _ = writeln!(out, "    {}", hit.snippet());
    }
    out
}

pub fn chat_answer(response: &ChatResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", response.answer.trim());
    if !response.citations.is_empty() {
        let _ = writeln!(out);
        for citation in &response.citations {
            let url = citation.url.as_deref().unwrap_or("");
            let _ = writeln!(out, "[{}] {} {}", citation.id, citation.title, url);
        }
    }
    let _ = writeln!(
        out,
        "\ngrounded on {} passage(s){}",
        response.top_k_used,
        latency_suffix(response.latency_ms)
    );
    out
}

pub fn latency_table(search: Option<StageLatency>, chat: Option<StageLatency>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} {:>10} {:>10}", "stage", "p50", "p95");
    for (label, stage) in [("search", search), ("chat", chat)] {
        match stage {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "{:<8} {:>7.0} ms {:>7.0} ms",
                    label, s.p50_ms, s.p95_ms
                );
            }
            None => {
                let _ = writeln!(out, "{:<8} {:>10} {:>10}", label, "-", "-");
            }
        }
    }
    out
}

pub fn eval_summary(eval: &EvalSummary) -> String {
    format!(
        "Precision@{}: {:.1}% (runs: {})",
        eval.k,
        eval.p_at_k * 100.0,
        eval.runs
    )
}

/// One status block per poll: latest sample, series length and any error.
pub fn poll_status<S: MetricsSource>(poller: &MetricsPoller<S>) -> String {
    let mut out = String::new();
    let window = poller.window();
    match window.latest() {
        Some(sample) => {
            let _ = writeln!(
                out,
                "{}  search p50 {:.0} ms  p95 {:.0} ms  ({}/{} samples)",
                sample.timestamp.format("%H:%M:%S"),
                sample.p50_ms,
                sample.p95_ms,
                window.len(),
                window.capacity()
            );
        }
        None => {
            let _ = writeln!(out, "no samples yet");
        }
    }
    if let Some(eval) = poller.eval() {
        let _ = writeln!(out, "  {}", eval_summary(eval));
    }
    if let Some(error) = poller.last_error() {
        let _ = writeln!(out, "  error: {error}");
    }
    out
}

pub fn eval_result(result: &EvalResult, elapsed: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Precision@{}: {:.1}% over {} quer{} in {:.1}s",
        result.k,
        result.p_at_k * 100.0,
        result.query_count(),
        if result.query_count() == 1 { "y" } else { "ies" },
        elapsed.as_secs_f64()
    );
    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

/// Shorten a long chunk id to `left…right`.
pub fn shorten_id(id: &str, left: usize, right: usize) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= left + right + 3 {
        return id.to_string();
    }
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}…{tail}")
}

pub fn candidates(response: &LabelAssistResponse) -> String {
    let mut out = String::new();
    if response.candidates.is_empty() {
        let _ = writeln!(out, "No candidates.");
        return out;
    }
    for candidate in &response.candidates {
        let page = candidate
            .page_num
            .map(|p| format!(" p{p}"))
            .unwrap_or_default();
        let _ = writeln!(out, "{}{}", candidate.title, page);

        let mut chips = Vec::new();
        if let Some(team) = &candidate.team {
            chips.push(format!("team: {team}"));
        }
        if let Some(doc_type) = &candidate.doc_type {
            chips.push(format!("type: {doc_type}"));
        }
        if let Some(score) = candidate.score {
            chips.push(format!("score {score:.2}"));
        }
        chips.push(shorten_id(&candidate.chunk_id, 18, 8));
        let _ = writeln!(out, "  {}", chips.join(" | "));

        if let Some(snippet) = &candidate.snippet {
            let _ = writeln!(out, "  {snippet}");
        }
    }
    out
}
