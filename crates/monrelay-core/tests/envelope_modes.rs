//! CloudEvents envelope parsing and marshalling.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use monrelay_core::envelope::{Envelope, Headers};
use serde_json::json;

fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[test]
fn binary_mode_reads_ce_headers_and_extensions() {
    let h = headers(&[
        ("content-type", "application/json"),
        ("ce-specversion", "1.0"),
        ("ce-id", "evt-1"),
        ("ce-source", "unit"),
        ("ce-type", "io.monrelay.request"),
        ("ce-time", "2026-10-17T10:00:00Z"),
        ("ce-a", "1"),
        ("ce-b", "2"),
        ("x-request-id", "abc"),
    ]);
    let body = json!({ "predicted": [1], "actual": [1], "task_type": "classification" });

    let env = Envelope::from_request(&h, &body).unwrap();
    assert_eq!(env.id, "evt-1");
    assert_eq!(env.source, "unit");
    assert_eq!(env.event_type, "io.monrelay.request");
    assert_eq!(env.time.as_deref(), Some("2026-10-17T10:00:00Z"));
    assert_eq!(env.data_content_type.as_deref(), Some("application/json"));
    assert_eq!(env.extensions.len(), 2);
    assert_eq!(env.extensions["a"], "1");
    assert_eq!(env.extensions["b"], "2");
    assert_eq!(env.data, Some(body));
}

#[test]
fn binary_mode_without_ce_headers_is_lenient() {
    let env = Envelope::from_request(&Headers::new(), &json!({"k": 1})).unwrap();
    assert!(env.id.is_empty());
    assert!(env.extensions.is_empty());
}

#[test]
fn structured_mode_splits_attributes_and_extensions() {
    let h = headers(&[("content-type", "application/cloudevents+json; charset=utf-8")]);
    let body = json!({
        "specversion": "1.0",
        "id": "",
        "source": "unit",
        "type": "io.monrelay.request",
        "datacontenttype": "application/json",
        "traceparent": "00-abc-def-01",
        "priority": 3,
        "data": { "predicted": [1], "actual": [0], "task_type": "classification" }
    });

    let env = Envelope::from_request(&h, &body).unwrap();
    assert_eq!(env.id, "");
    assert_eq!(env.data_content_type.as_deref(), Some("application/json"));
    assert_eq!(env.extensions["traceparent"], "00-abc-def-01");
    assert_eq!(env.extensions["priority"], "3");
    assert_eq!(env.data.unwrap()["task_type"], "classification");
}

#[test]
fn structured_mode_rejects_non_object_and_bad_attributes() {
    let h = headers(&[("content-type", "application/cloudevents+json")]);

    let err = Envelope::from_request(&h, &json!([1, 2])).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    let err = Envelope::from_request(&h, &json!({ "id": 7 })).unwrap_err();
    assert!(err.to_string().contains("`id`"));
}

#[test]
fn extension_names_must_be_lowercase_alphanumeric() {
    let h = headers(&[("content-type", "application/cloudevents+json")]);
    for bad in ["Trace", "trace-id", "trace_id", "tr\u{e9}ce"] {
        let mut body = json!({ "id": "e1", "data": {} });
        body[bad] = json!("x");
        let err = Envelope::from_request(&h, &body).unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "name={bad:?}");
    }

    let err = Envelope::from_request(&headers(&[("ce-my-ext", "1")]), &json!({})).unwrap_err();
    assert!(err.to_string().contains("my-ext"));

    let ok = json!({ "id": "e1", "trace01": "x", "data": {} });
    assert!(Envelope::from_request(&h, &ok).is_ok());
}

#[test]
fn extension_values_and_id_must_fit_in_a_header() {
    let h = headers(&[("content-type", "application/cloudevents+json")]);

    let err = Envelope::from_request(&h, &json!({ "traceparent": "a\r\nb" })).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    let err = Envelope::from_request(&h, &json!({ "id": "evt\n1" })).unwrap_err();
    assert!(err.to_string().contains("`id`"));
}

#[test]
fn unsupported_specversion_is_rejected() {
    let h = headers(&[("ce-specversion", "0.3")]);
    let err = Envelope::from_request(&h, &json!({})).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn to_binary_emits_ce_headers_and_json_body() {
    let mut env = Envelope {
        id: "reply-1".into(),
        source: "io.monrelay.server".into(),
        event_type: "io.monrelay.model.response".into(),
        time: Some("2026-10-17T10:00:00+00:00".into()),
        data: Some(json!({ "accuracy": 0.5 })),
        ..Default::default()
    };
    env.extensions.insert("a".into(), "1".into());

    let (headers, body) = env.to_binary().unwrap();

    assert_eq!(header(&headers, "ce-specversion"), Some("1.0"));
    assert_eq!(header(&headers, "ce-id"), Some("reply-1"));
    assert_eq!(header(&headers, "ce-source"), Some("io.monrelay.server"));
    assert_eq!(header(&headers, "ce-type"), Some("io.monrelay.model.response"));
    assert_eq!(header(&headers, "ce-time"), Some("2026-10-17T10:00:00+00:00"));
    assert_eq!(header(&headers, "ce-a"), Some("1"));
    assert_eq!(header(&headers, "content-type"), Some("application/json"));
    assert_eq!(header(&headers, "ce-subject"), None);

    let decoded: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(decoded, json!({ "accuracy": 0.5 }));
}

#[test]
fn structured_view_carries_extensions_and_data() {
    let mut env = Envelope {
        id: "x".into(),
        data: Some(json!(1)),
        ..Default::default()
    };
    env.extensions.insert("b".into(), "2".into());

    let v = env.to_structured();
    assert_eq!(v["specversion"], "1.0");
    assert_eq!(v["b"], "2");
    assert_eq!(v["data"], 1);
}
