//! Offset pagination (`?skip=&limit=`)

use serde::Deserialize;

/// Maximum rows per request
const MAX_LIMIT: u32 = 1000;

/// Default rows per request
const DEFAULT_LIMIT: u32 = 100;

/// Clamped window into an ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u32,
    pub limit: u32,
}

impl Window {
    /// Limit is clamped to 1..=1000.
    pub fn new(skip: u32, limit: u32) -> Self {
        Self {
            skip,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Query parameters for listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl From<WindowParams> for Window {
    fn from(params: WindowParams) -> Self {
        Self::new(
            params.skip.unwrap_or(0),
            params.limit.unwrap_or(DEFAULT_LIMIT),
        )
    }
}
