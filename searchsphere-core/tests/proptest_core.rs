//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use axum::http::StatusCode;
use searchsphere_core::gateway::{ForwardedBody, inject_latency, reconcile};
use searchsphere_core::groundtruth::{self, DEFAULT_K};
use searchsphere_core::origin::{OriginSources, normalize_base};
use searchsphere_core::poller::{LatencySample, LatencyWindow};
use serde_json::{Map, Value, json};

fn base_url() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        "[a-z][a-z0-9-]{0,15}(\\.[a-z]{2,5})?",
        proptest::option::of(1u16..65535),
        prop_oneof![Just(""), Just("/"), Just("/api"), Just("/API/"), Just("/v1/api/")],
        "[ \t]{0,2}",
    )
        .prop_map(|(scheme, host, port, suffix, pad)| {
            let port = port.map(|p| format!(":{p}")).unwrap_or_default();
            format!("{pad}{scheme}://{host}{port}{suffix}{pad}")
        })
}

// --- Origin normalization properties ---

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in ".{0,40}") {
        let once = normalize_base(&raw);
        prop_assert_eq!(normalize_base(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_on_urls(raw in base_url()) {
        let once = normalize_base(&raw);
        prop_assert_eq!(normalize_base(&once), once.clone());
        prop_assert!(!once.ends_with('/'));
        prop_assert!(!once.to_ascii_lowercase().ends_with("/api"));
    }

    #[test]
    fn public_override_always_wins(public in base_url(), server in base_url()) {
        let sources = OriginSources {
            public_base: Some(public.clone()),
            backend_url: Some(server.clone()),
            public_backend_url: Some(server),
            backend_api_base: None,
        };
        let resolved = sources.resolve();
        prop_assert_eq!(resolved.as_str(), normalize_base(&public));
    }

    #[test]
    fn resolved_origin_is_never_empty(
        public in proptest::option::of("[ /]{0,3}(api)?[ /]{0,3}"),
        server in proptest::option::of("[ /]{0,3}"),
    ) {
        let sources = OriginSources {
            public_base: public,
            backend_url: server,
            ..OriginSources::default()
        };
        let resolved = sources.resolve();
        prop_assert!(!resolved.as_str().is_empty());
    }
}

// --- Ground-truth properties ---

proptest! {
    #[test]
    fn missing_k_defaults_to_ten(
        queries in proptest::collection::vec("[a-z ]{0,10}[a-z]", 1..8),
    ) {
        let items: Vec<Value> = queries
            .iter()
            .map(|q| json!({"query": q, "relevant_ids": []}))
            .collect();
        let doc = groundtruth::normalize(&json!({"items": items})).unwrap();
        prop_assert_eq!(doc.k, DEFAULT_K);
        prop_assert_eq!(doc.len(), queries.len());
        prop_assert_eq!(doc.filters, Value::Null);
    }

    #[test]
    fn positive_k_is_preserved(k in 1u32..10_000) {
        let input = json!({"k": k, "items": [{"query": "q", "relevant_ids": ["a"]}]});
        prop_assert_eq!(groundtruth::normalize(&input).unwrap().k, k);
    }

    #[test]
    fn normalized_document_renormalizes_to_itself(
        k in 1u32..100,
        ids in proptest::collection::vec("[a-z0-9]{1,6}::[0-9]{1,3}", 0..5),
    ) {
        let input = json!({"groundtruth": {"k": k, "items": [{"query": "hybrid", "relevant_ids": ids}]}});
        let doc = groundtruth::normalize(&input).unwrap();
        let again = groundtruth::normalize(&doc.to_json()).unwrap();
        prop_assert_eq!(again, doc);
    }
}

// --- Reconciliation and latency properties ---

proptest! {
    #[test]
    fn non_json_text_is_passed_through(text in "[a-zA-Z ]{1,40}", code in 200u16..600) {
        prop_assume!(serde_json::from_str::<Value>(&text).is_err());
        let status = StatusCode::from_u16(code).unwrap();
        let resp = reconcile(status, Some("text/html"), text.clone());
        prop_assert_eq!(resp.status, status);
        prop_assert_eq!(
            resp.body,
            ForwardedBody::RawText { text, content_type: "text/html".into() }
        );
    }

    #[test]
    fn existing_latency_is_never_overwritten(existing in 0u64..1_000_000, measured in 0u64..1_000_000) {
        let mut object = Map::new();
        object.insert("__latency_ms".into(), json!(existing));
        prop_assert!(!inject_latency(&mut object, measured));
        prop_assert_eq!(&object["__latency_ms"], &json!(existing));
    }

    #[test]
    fn window_never_exceeds_capacity(capacity in 1usize..50, pushes in 0usize..120) {
        let mut window = LatencyWindow::new(capacity);
        for n in 0..pushes {
            window.push(LatencySample {
                timestamp: chrono::Utc::now(),
                p50_ms: n as f64,
                p95_ms: n as f64,
            });
        }
        prop_assert_eq!(window.len(), pushes.min(capacity));
        if pushes > 0 {
            prop_assert_eq!(window.latest().unwrap().p50_ms, (pushes - 1) as f64);
        }
    }
}
