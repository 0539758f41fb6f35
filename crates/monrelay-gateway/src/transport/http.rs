//! Event intake over HTTP.
//!
//! `POST /` accepts a CloudEvent in binary or structured mode and answers with
//! the model output as JSON. Errors become `{"code": ..., "msg": ...}` with the
//! status taken from the error's client code.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::json;
use tracing::Instrument;

use monrelay_core::envelope::Headers;
use monrelay_core::error::RelayError;

use crate::app_state::AppState;

/// `RelayError` as an HTTP response.
#[derive(Debug)]
pub struct HttpError(pub RelayError);

impl From<RelayError> for HttpError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "code": code.as_str(), "msg": self.0.to_string() }).to_string();

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

/// Flatten transport headers; repeated names are joined with ", ".
pub fn collect_headers(map: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

pub async fn intake(State(app): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let headers = collect_headers(&headers);
    let span = tracing::info_span!(
        "event",
        ce_id = headers.get("ce-id").map(String::as_str).unwrap_or(""),
        bytes = body.len()
    );

    let res = app.pipeline().handle(&headers, &body).instrument(span.clone()).await;

    match res {
        Ok(Some(data)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            data.to_string(),
        )
            .into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(e) => {
            span.in_scope(|| {
                if e.is_client_error() {
                    tracing::debug!(error = %e, "rejected event");
                } else {
                    tracing::error!(error = %e, "event processing failed");
                }
            });
            HttpError(e).into_response()
        }
    }
}
