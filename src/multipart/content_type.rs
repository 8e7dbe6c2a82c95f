//! Content-Type header helpers for multipart uploads.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BOUNDARY_PARAM: Regex =
        Regex::new(r"(?i)boundary=([^;]+)").expect("Invalid boundary regex");
}

/// Whether the Content-Type value announces a multipart form.
pub fn is_multipart_form(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("multipart/form-data")
}

/// Extracts the `boundary=` parameter, with surrounding quotes removed.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let raw = BOUNDARY_PARAM.captures(content_type)?.get(1)?.as_str();
    let boundary = raw.trim().trim_matches('"');
    if boundary.is_empty() {
        None
    } else {
        Some(boundary.to_string())
    }
}
