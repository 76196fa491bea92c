//! Grid-based density clustering of a significance mask.
//!
//! A restricted DBSCAN: the neighbourhood is fixed to the four orthogonal
//! neighbours and a point is dense only when all four of them are set. Border
//! pixels can never be dense because they lack a full neighbourhood.
//!
//! # Algorithm
//!
//! One raster pass over the mask. The first dense, unlabelled point met opens
//! a cluster and a breadth-first expansion claims everything reachable from
//! it:
//!
//! 1. The seed becomes `Core` and queues all four neighbours.
//! 2. Queued points that are dense become `Core` and queue their still
//!    unlabelled neighbours. Queued points that are not dense become
//!    `Perimeter`.
//! 3. Seed neighbours rejected earlier in the scan (provisional `Noise`) are
//!    corrected to `Perimeter` when popped. Raster order visits the cells
//!    above and left of the seed before the seed itself.
//!
//! Only the seed queues cells that are already labelled. Everything else
//! enters the queue through the `Unlabelled -> ToBeDetermined` transition,
//! so the pass is O(rows * cols) and needs no recursion.


use std::fmt;

use common::Grid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a cluster within one clustering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-owned source of cluster ids.
///
/// The sequence advances once per finalized cluster. Reset it (or use a
/// fresh one) to get reproducible ids for the same mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIdSequence {
    next: u32,
}

impl ClusterIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Id the next finalized cluster will receive.
    pub fn peek(&self) -> ClusterId {
        ClusterId(self.next)
    }

    fn advance(&mut self) {
        self.next = self.next.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

// ============================================================================
// Labels and clusters
// ============================================================================

/// State of one cell. `Unlabelled` and `ToBeDetermined` only exist while a
/// pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointLabel {
    #[default]
    Unlabelled,
    Noise,
    ToBeDetermined,
    Core(ClusterId),
    Perimeter(ClusterId),
}

impl PointLabel {
    pub fn cluster_id(self) -> Option<ClusterId> {
        match self {
            PointLabel::Core(id) | PointLabel::Perimeter(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PointLabel::Noise | PointLabel::Core(_) | PointLabel::Perimeter(_)
        )
    }
}

/// Integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// One density-connected blob. Points are stored in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    pub core_points: Vec<Point>,
    pub perimeter_points: Vec<Point>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.core_points.len() + self.perimeter_points.len()
    }

    /// Core points followed by perimeter points.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.core_points
            .iter()
            .chain(self.perimeter_points.iter())
            .copied()
    }
}

/// Result of one clustering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    pub labels: Grid<PointLabel>,
    pub clusters: Vec<Cluster>,
}

// ============================================================================
// Clusterer
// ============================================================================

/// Reusable clusterer. Keeps its work queue between calls so that
/// processing a stream of equally sized frames does not reallocate.
#[derive(Debug, Default)]
pub struct DensityClusterer {
    queue: Vec<usize>,
}

impl DensityClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels every cell of `mask` and collects the clusters it contains.
    /// Ids are drawn from `ids`, which is left pointing past the last cluster.
    pub fn cluster(&mut self, mask: &Grid<bool>, ids: &mut ClusterIdSequence) -> Clustering {
        let mut labels = Grid::new_filled(mask.rows(), mask.cols(), PointLabel::Unlabelled);
        let mut clusters = Vec::new();

        for idx in 0..mask.len() {
            if labels[idx] != PointLabel::Unlabelled {
                continue;
            }

            if !mask[idx] {
                labels[idx] = PointLabel::Noise;
                continue;
            }

            match dense_neighbours(mask, idx) {
                // Provisional: a later seed may still reach this point.
                None => labels[idx] = PointLabel::Noise,
                Some(neighbours) => {
                    let cluster = self.grow(mask, &mut labels, idx, neighbours, ids.peek());
                    ids.advance();
                    clusters.push(cluster);
                }
            }
        }

        debug_assert!(labels.iter().all(|label| label.is_terminal()));

        tracing::debug!(
            rows = mask.rows(),
            cols = mask.cols(),
            clusters = clusters.len(),
            "Density clustering finished"
        );

        Clustering { labels, clusters }
    }

    fn grow(
        &mut self,
        mask: &Grid<bool>,
        labels: &mut Grid<PointLabel>,
        seed: usize,
        seed_neighbours: [usize; 4],
        id: ClusterId,
    ) -> Cluster {
        let mut cluster = Cluster {
            id,
            core_points: Vec::new(),
            perimeter_points: Vec::new(),
        };

        self.queue.clear();
        labels[seed] = PointLabel::Core(id);
        cluster.core_points.push(point_at(mask, seed));
        for n in seed_neighbours {
            if labels[n] == PointLabel::Unlabelled {
                labels[n] = PointLabel::ToBeDetermined;
            }
            self.queue.push(n);
        }

        let mut head = 0;
        while head < self.queue.len() {
            let idx = self.queue[head];
            head += 1;

            let label = labels[idx];
            match label {
                // Provisionally rejected before the seed was reached.
                PointLabel::Noise => claim_perimeter(mask, labels, idx, &mut cluster),
                PointLabel::ToBeDetermined => match dense_neighbours(mask, idx) {
                    Some(neighbours) => self.claim_core(mask, labels, idx, neighbours, &mut cluster),
                    None => claim_perimeter(mask, labels, idx, &mut cluster),
                },
                // Owned by an earlier cluster.
                _ => {}
            }
        }

        cluster
    }

    /// Marks `idx` as core and queues its unlabelled neighbours.
    fn claim_core(
        &mut self,
        mask: &Grid<bool>,
        labels: &mut Grid<PointLabel>,
        idx: usize,
        neighbours: [usize; 4],
        cluster: &mut Cluster,
    ) {
        labels[idx] = PointLabel::Core(cluster.id);
        cluster.core_points.push(point_at(mask, idx));

        for n in neighbours {
            if labels[n] == PointLabel::Unlabelled {
                labels[n] = PointLabel::ToBeDetermined;
                self.queue.push(n);
            }
        }
    }
}

fn claim_perimeter(mask: &Grid<bool>, labels: &mut Grid<PointLabel>, idx: usize, cluster: &mut Cluster) {
    labels[idx] = PointLabel::Perimeter(cluster.id);
    cluster.perimeter_points.push(point_at(mask, idx));
}

/// Clusters `mask` with a fresh id sequence.
pub fn cluster_mask(mask: &Grid<bool>) -> Clustering {
    DensityClusterer::new().cluster(mask, &mut ClusterIdSequence::new())
}

/// Interprets an 8-bit image as a mask: values of 128 and above are set.
pub fn binarize(image: &Grid<u8>) -> Grid<bool> {
    image.map(|&v| v >= 128)
}

#[inline]
fn point_at<T>(grid: &Grid<T>, idx: usize) -> Point {
    let (row, col) = grid.position_of(idx);
    Point::new(row, col)
}

/// Returns the four orthogonal neighbours (up, left, down, right) of `idx`
/// if it is a core point: set, off the border, and fully surrounded.
#[inline]
fn dense_neighbours(mask: &Grid<bool>, idx: usize) -> Option<[usize; 4]> {
    let (row, col) = mask.position_of(idx);
    if !mask[idx] || mask.is_border(row, col) {
        return None;
    }

    let cols = mask.cols();
    let neighbours = [idx - cols, idx - 1, idx + cols, idx + 1];
    if neighbours.iter().all(|&n| mask[n]) {
        Some(neighbours)
    } else {
        None
    }
}
