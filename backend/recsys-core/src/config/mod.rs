use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{RecsysError, Result};

/// Upper bound on a stored weights path, matching the 255-byte column.
pub const MAX_WEIGHTS_PATH_BYTES: usize = 255;

/// Textual configuration pointing at externally trained weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    pub path_to_weights: String,
}

impl ModelConfig {
    /// Parses a raw byte buffer. Fails with a config error on invalid UTF-8;
    /// oversized input is truncated, same as [`parse_config`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| RecsysError::Config(format!("weights path is not valid UTF-8: {}", e)))?;
        Ok(parse_config(text))
    }
}

/// Parses a config string into a [`ModelConfig`].
///
/// Inputs longer than 255 bytes are truncated at the last char boundary that
/// fits. That is documented lossy behavior of the bounded buffer, not an
/// error; round-trips are lossless for inputs within the bound.
pub fn parse_config(input: &str) -> ModelConfig {
    ModelConfig {
        path_to_weights: truncate_at_boundary(input, MAX_WEIGHTS_PATH_BYTES).to_string(),
    }
}

/// Formats a [`ModelConfig`] back to its string form.
pub fn format_config(config: &ModelConfig) -> String {
    config.path_to_weights.clone()
}

fn truncate_at_boundary(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

/// Runtime configuration for hosts wiring up the Postgres adapters.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Upper bound on the candidate pool scored per `recommend` call; hosts
    /// pass it through `RecsysService::with_candidate_limit`.
    pub max_candidate_items: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/recsys".to_string()),
            max_candidate_items: env::var("MAX_CANDIDATE_ITEMS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("MAX_CANDIDATE_ITEMS must be a valid usize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_bound() {
        let config = parse_config("/var/lib/recsys/weights/model-7.bin");
        assert_eq!(parse_config(&format_config(&config)), config);
    }

    #[test]
    fn test_round_trip_at_exact_bound() {
        let path = "p".repeat(MAX_WEIGHTS_PATH_BYTES);
        let config = parse_config(&path);
        assert_eq!(config.path_to_weights.len(), MAX_WEIGHTS_PATH_BYTES);
        assert_eq!(parse_config(&format_config(&config)), config);
    }

    #[test]
    fn test_oversized_input_is_truncated_not_rejected() {
        let path = "w".repeat(400);
        let config = parse_config(&path);
        assert_eq!(config.path_to_weights.len(), MAX_WEIGHTS_PATH_BYTES);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 253 ASCII bytes followed by a 3-byte char: the char straddles the
        // 255-byte bound and must be dropped whole.
        let mut path = "a".repeat(253);
        path.push('\u{20AC}');
        let config = parse_config(&path);
        assert_eq!(config.path_to_weights, "a".repeat(253));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let err = ModelConfig::from_bytes(&[0x2f, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, RecsysError::Config(_)));
    }

    #[test]
    fn test_from_bytes_accepts_valid_utf8() {
        let config = ModelConfig::from_bytes(b"/opt/weights.bin").unwrap();
        assert_eq!(config.path_to_weights, "/opt/weights.bin");
    }
}
