//! Configuration types for cluster detection.
//!
//! All structs deserialize with per-field defaults, so a configuration file
//! only has to name the values it changes.

use std::path::Path;

use common::file_format::ConfigFormat;
use common::log_setup::LogConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Cluster filtering
// ============================================================================

/// Bounds used to prune outlier clusters by size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Clusters smaller than this are rejected.
    pub min_cluster_size: usize,
    /// Clusters larger than `mean + upper_sigma * stddev` are rejected.
    pub upper_sigma: f64,
    /// Rejected clusters larger than `mean + erase_perimeter_sigma * stddev`
    /// also lose their perimeter points. Smaller rejected clusters only lose
    /// their core points.
    pub erase_perimeter_sigma: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 4,
            upper_sigma: 1.0,
            erase_perimeter_sigma: 2.0,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.upper_sigma.is_finite() || self.upper_sigma < 0.0 {
            return Err(Error::Config(format!(
                "upper_sigma must be finite and non-negative, got {}",
                self.upper_sigma
            )));
        }
        if !self.erase_perimeter_sigma.is_finite() || self.erase_perimeter_sigma < 0.0 {
            return Err(Error::Config(format!(
                "erase_perimeter_sigma must be finite and non-negative, got {}",
                self.erase_perimeter_sigma
            )));
        }
        Ok(())
    }
}

// ============================================================================
// .pic files
// ============================================================================

/// How clipped `.pic` samples are mapped onto `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PicScaling {
    /// Divide by the cutoff, so brightness is comparable across frames.
    #[default]
    Cutoff,
    /// Divide by the brightest clipped sample of the frame.
    FrameMax,
}

/// Layout of a raw `.pic` frame: a fixed header followed by `rows * cols`
/// little-endian `f32` samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicFormat {
    pub rows: usize,
    pub cols: usize,
    /// Samples above this value are clipped to it before scaling.
    pub cutoff: f32,
    pub header_bytes: usize,
    pub scaling: PicScaling,
}

impl Default for PicFormat {
    fn default() -> Self {
        Self {
            rows: 1296,
            cols: 1728,
            cutoff: 900.0,
            header_bytes: 624,
            scaling: PicScaling::Cutoff,
        }
    }
}

impl PicFormat {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::Config(format!(
                "pic dimensions must be positive, got {}x{}",
                self.rows, self.cols
            )));
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(Error::Config(format!(
                "pic cutoff must be finite and positive, got {}",
                self.cutoff
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Detection pipeline
// ============================================================================

/// Parameters for a full detection run on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Blur window for the local background scale. Even values are bumped
    /// to the next odd number.
    pub background_window: usize,
    /// Blur window for the local signal scale.
    pub signal_window: usize,
    /// Sensitivity factor applied to the modelled local standard deviation.
    pub sigma: f64,
    /// Equalize the histogram before blurring.
    pub equalize: bool,
    pub filter: FilterConfig,
    pub pic: PicFormat,
    pub log: LogConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            background_window: 51,
            signal_window: 3,
            sigma: 1.0,
            equalize: true,
            filter: FilterConfig::default(),
            pic: PicFormat::default(),
            log: LogConfig::default(),
        }
    }
}

impl DetectionConfig {
    /// Loads a YAML or JSON configuration, chosen by file extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).map_err(|e| Error::Config(e.to_string()))?;
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = format
            .deserialize(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.background_window == 0 || self.signal_window == 0 {
            return Err(Error::Config(
                "blur windows must be positive".to_string(),
            ));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(Error::Config(format!(
                "sigma must be finite and positive, got {}",
                self.sigma
            )));
        }
        self.filter.validate()?;
        self.pic.validate()
    }
}
