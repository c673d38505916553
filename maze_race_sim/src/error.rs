// Errors for the crate's only fallible boundary: loading configuration.
//
// Everything else in the sim is total. Command rejections are ordinary
// values (`command::Rejection`), and invariant violations are assertions, not
// errors a caller could recover from.

use crate::command::AbilityKind;
use crate::types::Variant;

/// Why a `RaceConfig` could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("maze must be at least 7x7 with an odd width, got {width}x{height}")]
    MazeSize { width: u32, height: u32 },

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("no variant data for {0:?}")]
    MissingVariant(Variant),

    #[error("no ability data for {0:?}")]
    MissingAbility(AbilityKind),

    #[error("rival teams are configured but the deploy pool is empty")]
    EmptyDeployPool,
}
