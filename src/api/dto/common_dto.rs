//! Shared DTO types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

/// Pagination query parameters for history endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Maximum number of items (1–100). Defaults to 50.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Number of items to skip. Defaults to 0.
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl PageParams {
    /// Clamps `limit` to the allowed range of 1–100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
            offset: self.offset,
        }
    }
}
