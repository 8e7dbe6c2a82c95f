//! Shared constants for end-to-end tests
//!
//! When the upload form or test payloads change, update only this file.

// ============================================================================
// Upload Form Values
// ============================================================================

/// Transcript sent with test uploads
pub const TEST_TEXT: &str = "hello world";

/// Dialect sent with test uploads
pub const TEST_DIALECT: &str = "Min";

/// User id sent with test uploads
pub const TEST_USER_ID: &str = "user-42";

/// Size of the generated audio payload
pub const TEST_AUDIO_SIZE: usize = 1024;

/// Public base URL the test server advertises
pub const TEST_PUBLIC_BASE_URL: &str = "http://voice.test/static";

/// Display root the test server advertises
pub const TEST_DISPLAY_ROOT: &str = "/app/audio_files/audio";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Generates a deterministic audio-like payload of the given size
pub fn test_audio(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}
