//! Lenient multipart/form-data body decoding.
//!
//! The decoder never fails: segments it cannot make sense of are dropped,
//! so a malformed body simply shows up later as missing fields.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref PART_NAME: Regex =
        Regex::new(r#"(?:^|[\s;])name="([^"]+)""#).expect("Invalid part name regex");
}

const DISPOSITION_MARKER: &[u8] = b"Content-Disposition";
const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";
const TRAILING_ARTIFACTS: &[u8] = b"\r\n-";

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Raw part payload, boundary artifacts removed.
    pub content: Vec<u8>,
    /// The part header block as (lossy) text.
    pub raw_headers: String,
}

/// Result of decoding a multipart body.
#[derive(Debug, Clone, Default)]
pub struct DecodedForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, FileAttachment>,
}

impl DecodedForm {
    /// Returns the value of a text field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns a file attachment, if present.
    pub fn file(&self, name: &str) -> Option<&FileAttachment> {
        self.files.get(name)
    }
}

/// Decodes `body` into text fields and file attachments.
///
/// Repeated part names overwrite earlier ones.
pub fn decode(body: &[u8], boundary: &str) -> DecodedForm {
    let mut form = DecodedForm::default();
    if boundary.is_empty() {
        return form;
    }

    let delimiter = format!("--{}", boundary);
    for segment in split_on(body, delimiter.as_bytes()) {
        if find(segment, DISPOSITION_MARKER).is_none() {
            continue;
        }

        let Some(separator_at) = find(segment, HEADER_SEPARATOR) else {
            continue;
        };
        let headers = String::from_utf8_lossy(&segment[..separator_at]).into_owned();
        let content = trim_boundary_artifacts(&segment[separator_at + HEADER_SEPARATOR.len()..]);

        let Some(name) = part_name(&headers) else {
            continue;
        };

        if headers.contains("filename=") {
            form.files.insert(
                name,
                FileAttachment {
                    content: content.to_vec(),
                    raw_headers: headers,
                },
            );
        } else {
            form.fields
                .insert(name, String::from_utf8_lossy(content).into_owned());
        }
    }

    form
}

fn part_name(headers: &str) -> Option<String> {
    PART_NAME
        .captures(headers)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn trim_boundary_artifacts(mut content: &[u8]) -> &[u8] {
    while let Some((last, rest)) = content.split_last() {
        if !TRAILING_ARTIFACTS.contains(last) {
            break;
        }
        content = rest;
    }
    content
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split_on<'a>(mut haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    while let Some(at) = find(haystack, delimiter) {
        segments.push(&haystack[..at]);
        haystack = &haystack[at + delimiter.len()..];
    }
    segments.push(haystack);
    segments
}
