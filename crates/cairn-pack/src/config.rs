use serde::{Deserialize, Serialize};

/// Longest delta chain followed before an entry is treated as corrupt.
pub const DEFAULT_MAX_DELTA_DEPTH: usize = 50_000;

/// Configuration for [`PackReader`](crate::PackReader).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Check the trailing SHA-1 against the bytes before it.
    pub verify_trailer: bool,
    /// Maximum number of delta links between an object and its full base.
    pub max_delta_depth: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            verify_trailer: true,
            max_delta_depth: DEFAULT_MAX_DELTA_DEPTH,
        }
    }
}
