//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for the ingest server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// GET /
    pub async fn get_stats(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Stats request failed")
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Builds the standard upload form with the given transcript and audio
    pub fn recording_form(text: &str, audio: &[u8]) -> Form {
        Form::new()
            .text("text", text.to_string())
            .text("dialect", TEST_DIALECT)
            .text("user_id", TEST_USER_ID)
            .part(
                "file",
                Part::bytes(audio.to_vec())
                    .file_name("recording.m4a")
                    .mime_str("audio/mp4")
                    .expect("Invalid mime type"),
            )
    }

    /// POST /upload with the standard form
    pub async fn upload_recording(&self, text: &str, audio: &[u8]) -> Response {
        self.upload_form(Self::recording_form(text, audio)).await
    }

    /// POST /upload with an arbitrary multipart form
    pub async fn upload_form(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// POST to `path` with a raw body and explicit headers
    pub async fn post_raw(
        &self,
        path: &str,
        content_type: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Response {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.expect("Raw request failed")
    }

    // ========================================================================
    // Stored Objects
    // ========================================================================

    /// GET /static/{key}
    pub async fn get_stored(&self, key: &str) -> Response {
        self.client
            .get(format!("{}/static/{}", self.base_url, key))
            .send()
            .await
            .expect("Static request failed")
    }
}
