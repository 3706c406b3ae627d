//! Purpose: JSON envelopes for command results, shared by stdio and the C ABI.
//! Exports: `result_value`, `error_value`.
//! Invariants: Success is `{"ok": <outcome>}`; failure is `{"error": {"kind","message","detail"?}}`.
use serde_json::{Map, Value, json};

use crate::api::outcome::Outcome;
use crate::core::error::Error;

pub fn result_value(result: &Result<Outcome, Error>) -> Value {
    match result {
        Ok(outcome) => json!({ "ok": outcome }),
        Err(err) => json!({ "error": error_value(err) }),
    }
}

pub fn error_value(err: &Error) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_string(), json!(err.kind_label()));
    map.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(detail) = err.detail() {
        map.insert("detail".to_string(), json!(detail));
    }
    Value::Object(map)
}
