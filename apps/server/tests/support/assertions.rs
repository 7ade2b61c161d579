use anyhow::Context as _;
use axum::{body::Bytes, http::StatusCode};
use serde_json::Value;

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "unexpected status for {context}");
}

pub fn json_body(body: &Bytes) -> anyhow::Result<Value> {
    serde_json::from_slice(body).context("response body is JSON")
}

/// Assert an error envelope with the given code, returning its message.
pub fn assert_error_code(body: &Bytes, code: &str) -> anyhow::Result<String> {
    let value = json_body(body)?;
    assert_eq!(
        value["error"]["code"].as_str(),
        Some(code),
        "expected error code {code}, got {value}"
    );
    value["error"]["message"]
        .as_str()
        .map(str::to_string)
        .context("error.message is a string")
}

/// The `data` array of a certificate page.
pub fn page_data(page: &Value) -> anyhow::Result<&Vec<Value>> {
    page["data"].as_array().context("page.data is an array")
}

/// EO numbers of a certificate page, in order.
pub fn eo_numbers(page: &Value) -> anyhow::Result<Vec<String>> {
    Ok(page_data(page)?
        .iter()
        .filter_map(|row| row["eoNumber"].as_str().map(str::to_string))
        .collect())
}

pub fn assert_pagination(page: &Value, total: u64, total_pages: u64) {
    assert_eq!(page["pagination"]["total"].as_u64(), Some(total), "{page}");
    assert_eq!(
        page["pagination"]["totalPages"].as_u64(),
        Some(total_pages),
        "{page}"
    );
}
