//! LTEM - detection of compact magnetic features in Lorentz TEM frames.
//!
//! The pipeline turns a grayscale frame into a set of clusters:
//! - Significance thresholding of a signal-scale blur against a
//!   background-scale blur
//! - Restricted DBSCAN on the 4-neighbourhood of the resulting mask
//! - Statistical pruning of clusters by size
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ltem::{detect, load_image, DetectionConfig};
//!
//! let image = load_image("frame.png".as_ref())?;
//! let report = detect(&image, &DetectionConfig::default())?;
//! println!("Found {} clusters", report.outcome.kept.len());
//! ```

pub mod clustering;
pub mod config;
pub mod detector;
pub mod error;
pub mod filter;
pub mod imaging;
pub mod lines;
pub mod protocol;
pub mod report;
pub mod server;
pub mod significance;

pub use common::Grid;

// ============================================================================
// Core algorithm
// ============================================================================

pub use clustering::{
    binarize, cluster_mask, Cluster, ClusterId, ClusterIdSequence, Clustering, DensityClusterer,
    Point, PointLabel,
};
pub use filter::{filter_clusters, ClusterStatistics, FilterOutcome, PointClass};
pub use significance::compute_significance;

// ============================================================================
// Pipeline
// ============================================================================

pub use config::{DetectionConfig, FilterConfig, PicFormat, PicScaling};
pub use detector::{detect, detect_file, detect_frames, Detector, FrameReport};
pub use error::{Error, Result, Stage};
pub use imaging::{
    equalize_histogram, gaussian_blur, is_pic_path, load_frame, load_image, load_pic,
    odd_window, save_gray_png,
};

// ============================================================================
// Frontends
// ============================================================================

pub use lines::{run_lines, LineRequest};
pub use protocol::{Opcode, ProtocolError, Request, Response, Status};
pub use report::write_report;
pub use server::Server;
