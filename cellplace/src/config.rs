//! Library-wide settings.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};

/// Settings shared by every design in a [`Library`](crate::Library).
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct LibraryConfig {
    /// The database unit, in micrometers.
    ///
    /// Bounding boxes are snapped to this grid when `snap_bbox` is set.
    #[builder(default = "0.001")]
    pub(crate) dbu: f64,
    /// Whether to snap bounding boxes to the database unit.
    #[builder(default = "true")]
    pub(crate) snap_bbox: bool,
    /// The name given to scratch arenas.
    #[builder(setter(into), default = "ArcStr::from(\"scratch\")")]
    pub(crate) scratch_name: ArcStr,
}

impl LibraryConfigBuilder {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(dbu) = self.dbu {
            check_dbu(dbu)?;
        }
        Ok(())
    }
}

fn check_dbu(dbu: f64) -> std::result::Result<(), String> {
    if !(dbu.is_finite() && dbu > 0.) {
        return Err(format!(
            "database unit must be positive and finite, got `{dbu}`"
        ));
    }
    Ok(())
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dbu: 0.001,
            snap_bbox: true,
            scratch_name: ArcStr::from("scratch"),
        }
    }
}

impl LibraryConfig {
    #[inline]
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::default()
    }

    /// Parses a configuration from TOML. Missing keys take their default values.
    pub fn from_toml(input: &str) -> Result<Self> {
        let value: Self = with_err_context(toml::from_str(input), || ErrorContext::LoadConfig)?;
        value.check()?;
        Ok(value)
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_dbu(self.dbu).map_err(|msg| ErrorSource::InvalidArgs(msg).into())
    }

    #[inline]
    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    #[inline]
    pub fn snap_bbox(&self) -> bool {
        self.snap_bbox
    }

    #[inline]
    pub fn scratch_name(&self) -> &ArcStr {
        &self.scratch_name
    }
}
