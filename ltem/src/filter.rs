//! Statistical pruning of clusters by size.
//!
//! Clusters smaller than a fixed minimum or larger than one standard
//! deviation above the mean size are rejected. Rejected clusters always lose
//! their core points; their perimeter is erased only for extreme outliers.

use common::Grid;

use crate::clustering::{Cluster, Clustering, PointLabel};
use crate::config::FilterConfig;

/// Size statistics of a set of clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterStatistics {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

impl ClusterStatistics {
    /// Returns `None` for an empty slice.
    pub fn from_clusters(clusters: &[Cluster]) -> Option<Self> {
        let sizes: Vec<usize> = clusters.iter().map(Cluster::size).collect();
        let min = *sizes.iter().min()?;
        let max = *sizes.iter().max()?;

        let n = sizes.len() as f64;
        let mean = sizes.iter().sum::<usize>() as f64 / n;
        let variance = sizes
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Some(Self {
            min,
            max,
            mean,
            stddev: variance.sqrt(),
        })
    }

    /// `mean + factor * stddev`
    #[inline]
    pub fn bound(&self, factor: f64) -> f64 {
        self.mean + factor * self.stddev
    }
}

/// Visualization class of a pixel after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointClass {
    #[default]
    Background,
    Core,
    Perimeter,
}

impl PointClass {
    pub fn gray(self) -> u8 {
        match self {
            PointClass::Background => 0,
            PointClass::Core => 128,
            PointClass::Perimeter => 255,
        }
    }
}

impl From<PointLabel> for PointClass {
    fn from(label: PointLabel) -> Self {
        match label {
            PointLabel::Core(_) => PointClass::Core,
            PointLabel::Perimeter(_) => PointClass::Perimeter,
            _ => PointClass::Background,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Statistics of the raw clusters, before pruning.
    pub statistics: Option<ClusterStatistics>,
    pub kept: Vec<Cluster>,
    pub rejected: usize,
    pub classes: Grid<PointClass>,
}

impl FilterOutcome {
    /// Classes rendered as gray levels (0 background, 128 core, 255 perimeter).
    pub fn visualization(&self) -> Grid<u8> {
        self.classes.map(|c| c.gray())
    }
}

/// Prunes outlier clusters and builds the visualization grid.
pub fn filter_clusters(clustering: Clustering, config: &FilterConfig) -> FilterOutcome {
    let Clustering {
        mut labels,
        clusters,
    } = clustering;

    let Some(statistics) = ClusterStatistics::from_clusters(&clusters) else {
        return FilterOutcome {
            statistics: None,
            kept: Vec::new(),
            rejected: 0,
            classes: labels.map(|&l| PointClass::from(l)),
        };
    };

    let lower_bound = config.min_cluster_size;
    let upper_bound = statistics.bound(config.upper_sigma);
    let erase_bound = statistics.bound(config.erase_perimeter_sigma);

    let mut kept = Vec::with_capacity(clusters.len());
    let mut rejected = 0;
    for cluster in clusters {
        let size = cluster.size();
        if size >= lower_bound && size as f64 <= upper_bound {
            kept.push(cluster);
            continue;
        }

        rejected += 1;
        for p in &cluster.core_points {
            labels[(p.row, p.col)] = PointLabel::Noise;
        }
        if size as f64 > erase_bound {
            for p in &cluster.perimeter_points {
                labels[(p.row, p.col)] = PointLabel::Noise;
            }
        }
    }

    tracing::debug!(
        min = statistics.min,
        max = statistics.max,
        mean = statistics.mean,
        stddev = statistics.stddev,
        upper_bound,
        kept = kept.len(),
        rejected,
        "Cluster filtering finished"
    );

    FilterOutcome {
        statistics: Some(statistics),
        kept,
        rejected,
        classes: labels.map(|&l| PointClass::from(l)),
    }
}
