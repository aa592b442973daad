//! The fixed, ordered list of endpoints a run shoots at.

use perfshot_common::{ShotError, ShotResult};

/// Non-empty ordered endpoint list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ammunition {
    endpoints: Vec<String>,
}

impl Ammunition {
    pub fn new(endpoints: Vec<String>) -> ShotResult<Self> {
        if endpoints.is_empty() {
            return Err(ShotError::configuration("Ammunition must contain at least one endpoint"));
        }
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Reduce a raw draw to an endpoint index and its URL. Every draw maps
    /// to an endpoint.
    pub fn select(&self, draw: u32) -> (usize, &str) {
        let index = draw as usize % self.endpoints.len();
        (index, &self.endpoints[index])
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}
