use std::f64::consts::FRAC_PI_4;
use std::f64::consts::FRAC_PI_8;
use std::fmt;
use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use twoview_geometry::{CameraIntrinsics, Correspondence};

/// Length of the feature vector.
pub const FEATURE_LEN: usize = 23;

/// Number of motion-direction bins.
pub const NUM_DIRECTIONS: usize = 8;

/// Error types for correspondence summaries.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    /// A summary line has fewer columns than required.
    #[error("Expected at least {expected} columns, got {actual}")]
    MissingColumns {
        /// Required number of columns.
        expected: usize,
        /// Number of columns found.
        actual: usize,
    },

    /// A column could not be parsed.
    #[error("Failed to parse column {column}: {message}")]
    ParseError {
        /// Zero-based column index.
        column: usize,
        /// Parser message.
        message: String,
    },

    /// Not enough correspondences for the measure.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },
}

/// Normalization constants of the feature vector.
///
/// They are fixed per dataset rather than derived from each sample, so the same
/// correspondence statistics always map to the same features.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryParams {
    /// Image width in pixels, scales x coordinates.
    pub image_width: f64,
    /// Image height in pixels, scales y coordinates.
    pub image_height: f64,
    /// Scale of the correspondence count.
    pub count_scale: f64,
    /// Scale of the disparity mean and standard deviation.
    pub disparity_scale: f64,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            image_width: 640.0,
            image_height: 480.0,
            count_scale: 300.0,
            disparity_scale: 800.0,
        }
    }
}

impl SummaryParams {
    /// Default scales with the image size of `intrinsics`.
    pub fn from_intrinsics(intrinsics: &CameraIntrinsics) -> Self {
        Self {
            image_width: intrinsics.width as f64,
            image_height: intrinsics.height as f64,
            ..Self::default()
        }
    }
}

/// Image-space motion direction, with y pointing up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Up.
    N,
    /// Up and right.
    NE,
    /// Right.
    E,
    /// Down and right.
    SE,
    /// Down.
    S,
    /// Down and left.
    SW,
    /// Left.
    W,
    /// Up and left.
    NW,
}

impl Direction {
    /// All directions in histogram order.
    pub const ALL: [Direction; NUM_DIRECTIONS] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    /// Direction of a pixel displacement.
    ///
    /// The angle is measured with the image y axis flipped and assigned to 45 degree
    /// sectors centered on the cardinal and diagonal directions. A zero displacement
    /// reads as east.
    pub fn from_displacement(d: DVec2) -> Self {
        let angle = (-d.y).atan2(d.x);
        let shifted = if angle >= 0.0 {
            angle + FRAC_PI_8
        } else {
            angle - FRAC_PI_8
        };
        match (shifted / FRAC_PI_4) as i32 {
            0 => Direction::E,
            1 => Direction::NE,
            2 => Direction::N,
            3 => Direction::NW,
            -1 => Direction::SE,
            -2 => Direction::S,
            -3 => Direction::SW,
            _ => Direction::W,
        }
    }

    /// Position of the direction in [`Direction::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Raw statistics of a correspondence set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSummary {
    /// Number of correspondences.
    pub count: usize,
    /// Mean disparity in pixels.
    pub disparity_mean: f64,
    /// Population standard deviation of the disparity in pixels.
    pub disparity_std: f64,
    /// Smallest x in the primary view.
    pub min_x0: f64,
    /// Largest x in the primary view.
    pub max_x0: f64,
    /// Smallest y in the primary view.
    pub min_y0: f64,
    /// Largest y in the primary view.
    pub max_y0: f64,
    /// Smallest x in the secondary view.
    pub min_x1: f64,
    /// Largest x in the secondary view.
    pub max_x1: f64,
    /// Smallest y in the secondary view.
    pub min_y1: f64,
    /// Largest y in the secondary view.
    pub max_y1: f64,
    /// `max_x0 - min_x0`.
    pub range_x0: f64,
    /// `max_y0 - min_y0`.
    pub range_y0: f64,
    /// `max_x1 - min_x1`.
    pub range_x1: f64,
    /// `max_y1 - min_y1`.
    pub range_y1: f64,
    /// Motion-direction counts in [`Direction::ALL`] order.
    pub bins: [usize; NUM_DIRECTIONS],
}

impl CorrespondenceSummary {
    /// Summarize a correspondence set.
    ///
    /// The result does not depend on the order of `correspondences`. An empty set
    /// yields the all-zero summary.
    pub fn compute(correspondences: &[Correspondence]) -> Self {
        if correspondences.is_empty() {
            return Self::default();
        }

        let mut bins = [0usize; NUM_DIRECTIONS];
        let mut disparities = Vec::with_capacity(correspondences.len());
        let (mut min0, mut max0) = (DVec2::INFINITY, DVec2::NEG_INFINITY);
        let (mut min1, mut max1) = (DVec2::INFINITY, DVec2::NEG_INFINITY);

        for c in correspondences {
            bins[Direction::from_displacement(c.displacement()).index()] += 1;
            disparities.push(c.disparity());
            min0 = min0.min(c.primary());
            max0 = max0.max(c.primary());
            min1 = min1.min(c.secondary());
            max1 = max1.max(c.secondary());
        }

        // summation order fixed by value
        disparities.sort_by(|a, b| a.total_cmp(b));
        let n = disparities.len() as f64;
        let mean = disparities.iter().sum::<f64>() / n;
        let variance = disparities.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        Self {
            count: correspondences.len(),
            disparity_mean: mean,
            disparity_std: variance.sqrt(),
            min_x0: min0.x,
            max_x0: max0.x,
            min_y0: min0.y,
            max_y0: max0.y,
            min_x1: min1.x,
            max_x1: max1.x,
            min_y1: min1.y,
            max_y1: max1.y,
            range_x0: max0.x - min0.x,
            range_y0: max0.y - min0.y,
            range_x1: max1.x - min1.x,
            range_y1: max1.y - min1.y,
            bins,
        }
    }

    /// Count of the given direction.
    pub fn bin(&self, direction: Direction) -> usize {
        self.bins[direction.index()]
    }

    /// The normalized feature vector.
    ///
    /// Layout: count, disparity mean, disparity std, min/max x0, min/max y0, min/max x1,
    /// min/max y1, ranges x0, y0, x1, y1, then the eight direction bins scaled to unit
    /// length. Coordinates are divided by the image size, the count and disparities by
    /// their fixed scales.
    pub fn features(&self, params: &SummaryParams) -> [f64; FEATURE_LEN] {
        let w = params.image_width;
        let h = params.image_height;
        let mut f = [0.0; FEATURE_LEN];
        f[0] = self.count as f64 / params.count_scale;
        f[1] = self.disparity_mean / params.disparity_scale;
        f[2] = self.disparity_std / params.disparity_scale;
        f[3] = self.min_x0 / w;
        f[4] = self.max_x0 / w;
        f[5] = self.min_y0 / h;
        f[6] = self.max_y0 / h;
        f[7] = self.min_x1 / w;
        f[8] = self.max_x1 / w;
        f[9] = self.min_y1 / h;
        f[10] = self.max_y1 / h;
        f[11] = self.range_x0 / w;
        f[12] = self.range_y0 / h;
        f[13] = self.range_x1 / w;
        f[14] = self.range_y1 / h;

        let norm = self
            .bins
            .iter()
            .map(|&b| (b * b) as f64)
            .sum::<f64>()
            .sqrt();
        if norm > 0.0 {
            for (dst, &b) in f[15..].iter_mut().zip(self.bins.iter()) {
                *dst = b as f64 / norm;
            }
        }
        f
    }
}

impl fmt::Display for CorrespondenceSummary {
    /// Comma-separated raw values: count, mean, std, min/max x0, min/max y0, ranges x0
    /// and y0, min/max x1, min/max y1, ranges x1 and y1, then the bins.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.count,
            self.disparity_mean,
            self.disparity_std,
            self.min_x0,
            self.max_x0,
            self.min_y0,
            self.max_y0,
            self.range_x0,
            self.range_y0,
            self.min_x1,
            self.max_x1,
            self.min_y1,
            self.max_y1,
            self.range_x1,
            self.range_y1,
        )?;
        for b in self.bins {
            write!(f, ",{b}")?;
        }
        Ok(())
    }
}

impl FromStr for CorrespondenceSummary {
    type Err = SummaryError;

    /// Parse the [`Display`](fmt::Display) form. Columns past the 23rd are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.trim().split(',').map(str::trim).collect::<Vec<_>>();
        if parts.len() < FEATURE_LEN {
            return Err(SummaryError::MissingColumns {
                expected: FEATURE_LEN,
                actual: parts.len(),
            });
        }

        let float = |i: usize| parse_part::<f64>(parts[i], i);
        let mut bins = [0usize; NUM_DIRECTIONS];
        for (i, bin) in bins.iter_mut().enumerate() {
            *bin = parse_part::<usize>(parts[15 + i], 15 + i)?;
        }

        Ok(Self {
            count: parse_part::<usize>(parts[0], 0)?,
            disparity_mean: float(1)?,
            disparity_std: float(2)?,
            min_x0: float(3)?,
            max_x0: float(4)?,
            min_y0: float(5)?,
            max_y0: float(6)?,
            range_x0: float(7)?,
            range_y0: float(8)?,
            min_x1: float(9)?,
            max_x1: float(10)?,
            min_y1: float(11)?,
            max_y1: float(12)?,
            range_x1: float(13)?,
            range_y1: float(14)?,
            bins,
        })
    }
}

fn parse_part<T: FromStr>(s: &str, column: usize) -> Result<T, SummaryError>
where
    T::Err: fmt::Display,
{
    s.parse::<T>().map_err(|e| SummaryError::ParseError {
        column,
        message: format!("{s}: {e}"),
    })
}
