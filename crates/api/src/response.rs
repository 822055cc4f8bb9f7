//! Response envelopes. Successful bodies are always `{ "data": ... }`.

use serde::Serialize;

use procura_core::extraction::ExtractionIssue;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// An extracted value with its issues inlined next to the value's own
/// fields: `{ "title": ..., "issues": [...] }`.
#[derive(Debug, Serialize)]
pub struct Extracted<T: Serialize> {
    #[serde(flatten)]
    pub value: T,
    pub issues: Vec<ExtractionIssue>,
}
