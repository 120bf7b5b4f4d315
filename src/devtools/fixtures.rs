// src/devtools/fixtures.rs

// 🌍 Standard library
use std::fs;
use std::path::PathBuf;

/// Loads a raw JSON fixture as a string from the `fixtures/` directory.
///
/// # Arguments
/// * `filename` - The name of the fixture file to load.
///
/// # Returns
/// The contents of the fixture file as a `String`.
///
/// # Panics
/// Panics if the file cannot be read. Intended for development use only.
#[must_use]
pub fn load_json_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

    path.push("fixtures");
    path.push(filename);

    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("❌ Failed to read fixture file '{}': {}", path.display(), e))
}

/// Wraps a fixture payload in the venue's reply envelope, echoing `req_id`.
///
/// # Panics
/// Panics if the fixture is not valid JSON. Intended for development use only.
#[must_use]
pub fn venue_reply(msg_type: &str, filename: &str, req_id: u64) -> serde_json::Value {
    let payload: serde_json::Value = serde_json::from_str(&load_json_fixture(filename))
        .unwrap_or_else(|e| panic!("❌ Fixture '{filename}' is not valid JSON: {e}"));

    serde_json::json!({
        "echo_req": {},
        "msg_type": msg_type,
        msg_type: payload,
        "req_id": req_id,
    })
}
