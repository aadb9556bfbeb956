//! Layer identifiers.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A GDS-style `(layer, datatype)` pair.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct LayerSpec(pub i32, pub i32);

impl LayerSpec {
    /// Creates a new [`LayerSpec`].
    #[inline]
    pub fn new(layer: i32, datatype: i32) -> Self {
        Self(layer, datatype)
    }

    #[inline]
    pub fn layer(&self) -> i32 {
        self.0
    }

    #[inline]
    pub fn datatype(&self) -> i32 {
        self.1
    }
}

impl From<(i32, i32)> for LayerSpec {
    fn from(value: (i32, i32)) -> Self {
        Self(value.0, value.1)
    }
}

impl Display for LayerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}
