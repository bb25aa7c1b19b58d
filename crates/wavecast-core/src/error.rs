// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for Wavecast.
//!
//! This module provides a hierarchy of error types for better error handling
//! and programmatic error inspection. All errors implement `Display` and can
//! be converted to/from `String` for backward compatibility.

use thiserror::Error;

/// Main error type for Wavecast operations.
///
/// This enum categorizes errors into distinct types to enable better error
/// handling, logging, and recovery strategies.
#[derive(Debug, Error)]
pub enum WavecastError {
    /// Configuration or parameter validation error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Runtime processing error during normal operation.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Network-related error (sockets, HTTP, WHEP, etc.).
    #[error("network error: {0}")]
    Network(String),

    /// Ogg/Opus container parsing error.
    #[error("codec error: {0}")]
    Codec(String),

    /// Transcoder subprocess lifecycle error.
    #[error("transcoder error: {0}")]
    Transcoder(String),

    /// WebRTC/WHEP negotiation error.
    #[error("webrtc error: {0}")]
    Rtc(String),

    /// I/O error (file operations, pipes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `WavecastError`.
pub type Result<T> = std::result::Result<T, WavecastError>;

impl From<WavecastError> for String {
    fn from(err: WavecastError) -> Self {
        err.to_string()
    }
}

impl From<String> for WavecastError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for WavecastError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WavecastError::Configuration("invalid sample rate".to_string());
        assert_eq!(err.to_string(), "configuration error: invalid sample rate");

        let err = WavecastError::Network("connection timeout".to_string());
        assert_eq!(err.to_string(), "network error: connection timeout");
    }

    #[test]
    fn test_error_to_string_conversion() {
        let err = WavecastError::Runtime("processing failed".to_string());
        let s: String = err.into();
        assert_eq!(s, "runtime error: processing failed");
    }

    #[test]
    fn test_string_to_error_conversion() {
        let err: WavecastError = "something went wrong".into();
        assert_eq!(err.to_string(), "runtime error: something went wrong");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WavecastError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("file not found"));
    }
}
