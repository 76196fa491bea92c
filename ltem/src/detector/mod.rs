//! Detection pipeline: a stateful stage-by-stage session and stateless
//! one-shot entry points.
//!
//! The session mirrors how remote clients drive the pipeline: load a frame,
//! optionally equalize it, compute the two blur scales, threshold, then
//! cluster. Every stage checks that its inputs exist and reports the
//! missing one otherwise.

#[cfg(test)]
mod tests;

use std::path::Path;

use common::Grid;
use rayon::prelude::*;

use crate::clustering::{binarize, cluster_mask, ClusterIdSequence, DensityClusterer};
use crate::config::{DetectionConfig, FilterConfig, PicFormat};
use crate::error::{Error, Result, Stage};
use crate::filter::{filter_clusters, FilterOutcome};
use crate::imaging::{equalize_histogram, gaussian_blur, load_frame, odd_window};
use crate::significance::compute_significance;

/// Output of a full detection run on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub mask: Grid<bool>,
    pub outcome: FilterOutcome,
}

// =============================================================================
// Detector session
// =============================================================================

/// Holds the intermediate buffers of one frame between stage calls.
#[derive(Debug, Default)]
pub struct Detector {
    image: Option<Grid<u8>>,
    background: Option<Grid<u8>>,
    signal: Option<Grid<u8>>,
    significance: Option<Grid<bool>>,
    outcome: Option<FilterOutcome>,
    ids: ClusterIdSequence,
    clusterer: DensityClusterer,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the main image and drops everything derived from the old one.
    pub fn set_image(&mut self, image: Grid<u8>) {
        tracing::info!(rows = image.rows(), cols = image.cols(), "Frame set");
        self.image = Some(image);
        self.invalidate_derived();
        self.ids.reset();
    }

    pub fn load_file(&mut self, path: &Path, pic: Option<&PicFormat>) -> Result<()> {
        let image = load_frame(path, pic)?;
        self.set_image(image);
        Ok(())
    }

    pub fn image(&self) -> Option<&Grid<u8>> {
        self.image.as_ref()
    }

    pub fn background(&self) -> Option<&Grid<u8>> {
        self.background.as_ref()
    }

    pub fn signal(&self) -> Option<&Grid<u8>> {
        self.signal.as_ref()
    }

    pub fn significance(&self) -> Option<&Grid<bool>> {
        self.significance.as_ref()
    }

    pub fn outcome(&self) -> Option<&FilterOutcome> {
        self.outcome.as_ref()
    }

    pub fn ids(&self) -> &ClusterIdSequence {
        &self.ids
    }

    /// Equalizes the main image in place.
    pub fn equalize(&mut self) -> Result<()> {
        let image = self.image.as_ref().ok_or(Error::Precondition(Stage::Image))?;
        self.image = Some(equalize_histogram(image));
        self.invalidate_derived();
        Ok(())
    }

    pub fn calculate_background(&mut self, window: usize) -> Result<()> {
        let image = self.image.as_ref().ok_or(Error::Precondition(Stage::Image))?;
        self.background = Some(gaussian_blur(image, window)?);
        self.invalidate_mask();
        Ok(())
    }

    pub fn calculate_signal(&mut self, window: usize) -> Result<()> {
        let image = self.image.as_ref().ok_or(Error::Precondition(Stage::Image))?;
        self.signal = Some(gaussian_blur(image, window)?);
        self.invalidate_mask();
        Ok(())
    }

    pub fn calculate_significance(&mut self, sigma: f64) -> Result<()> {
        let background = self
            .background
            .as_ref()
            .ok_or(Error::Precondition(Stage::Background))?;
        let signal = self
            .signal
            .as_ref()
            .ok_or(Error::Precondition(Stage::Signal))?;

        self.significance = Some(compute_significance(signal, background, sigma)?);
        self.outcome = None;
        Ok(())
    }

    /// Clusters the significance mask, or the main image thresholded at 128
    /// when no mask has been computed, and prunes outliers.
    pub fn cluster(&mut self, config: &FilterConfig) -> Result<&FilterOutcome> {
        let clustering = match (&self.significance, &self.image) {
            (Some(mask), _) => self.clusterer.cluster(mask, &mut self.ids),
            (None, Some(image)) => self.clusterer.cluster(&binarize(image), &mut self.ids),
            (None, None) => return Err(Error::Precondition(Stage::Image)),
        };

        let outcome = filter_clusters(clustering, config);
        tracing::info!(
            kept = outcome.kept.len(),
            rejected = outcome.rejected,
            "Session clustering finished"
        );

        Ok(self.outcome.insert(outcome))
    }

    fn invalidate_derived(&mut self) {
        self.background = None;
        self.signal = None;
        self.invalidate_mask();
    }

    fn invalidate_mask(&mut self) {
        self.significance = None;
        self.outcome = None;
    }
}

// =============================================================================
// One-shot pipeline
// =============================================================================

/// Runs the whole pipeline on one frame. Even blur windows are bumped to
/// the next odd size.
pub fn detect(image: &Grid<u8>, config: &DetectionConfig) -> Result<FrameReport> {
    let equalized;
    let image = if config.equalize {
        equalized = equalize_histogram(image);
        &equalized
    } else {
        image
    };

    let background = gaussian_blur(image, odd_window(config.background_window))?;
    let signal = gaussian_blur(image, odd_window(config.signal_window))?;
    let mask = compute_significance(&signal, &background, config.sigma)?;
    let outcome = filter_clusters(cluster_mask(&mask), &config.filter);

    tracing::info!(
        rows = image.rows(),
        cols = image.cols(),
        kept = outcome.kept.len(),
        rejected = outcome.rejected,
        "Frame processed"
    );

    Ok(FrameReport { mask, outcome })
}

/// Loads a frame from disk and runs [`detect`] on it.
pub fn detect_file(path: &Path, config: &DetectionConfig) -> Result<FrameReport> {
    let image = load_frame(path, Some(&config.pic))?;
    detect(&image, config)
}

/// Processes independent frames in parallel. Results keep the input order.
pub fn detect_frames(frames: &[Grid<u8>], config: &DetectionConfig) -> Vec<Result<FrameReport>> {
    frames.par_iter().map(|frame| detect(frame, config)).collect()
}
