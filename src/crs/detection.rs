//! Heuristic coordinate system detection from raw coordinates.
//!
//! Swiss projected coordinates are unambiguous in magnitude (seven-digit
//! eastings starting with 2 for LV95, six-digit ones for LV03), so those
//! checks run first. The WGS84 check is weaker and only accepts samples
//! that look like real degrees: inside the lon/lat range and carrying
//! fractional parts, which rules out small integer grids such as pixel
//! coordinates.

use serde::Serialize;

use crate::crs::registry::{NONE, SWISS_LV03, SWISS_LV95, WGS84};
use crate::geometry::Point;

/// Maximum number of points inspected.
pub const MAX_SAMPLES: usize = 10;

/// Share of samples that must match a Swiss signature.
pub const MATCH_RATIO: f64 = 0.8;

/// Easting range and northing band of a projected system.
///
/// The easting range is the national extent. The northing band starts at
/// the southern extent and spans the system's whole false-northing digit
/// class, so points a little north of the border still count.
#[derive(Debug, Clone, Copy)]
struct Signature {
    code: &'static str,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Signature {
    fn matches(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y < self.max_y
    }
}

const LV95_SIGNATURE: Signature = Signature {
    code: SWISS_LV95,
    min_x: 2_485_000.0,
    max_x: 2_835_000.0,
    min_y: 1_075_000.0,
    max_y: 2_000_000.0,
};

const LV03_SIGNATURE: Signature = Signature {
    code: SWISS_LV03,
    min_x: 485_000.0,
    max_x: 835_000.0,
    min_y: 75_000.0,
    max_y: 1_000_000.0,
};

/// Outcome of [`suggest_coordinate_system`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSuggestion {
    /// Suggested code; [`NONE`] when nothing matched.
    pub code: String,
    /// Share of sampled points supporting the suggestion.
    pub ratio: f64,
    /// Number of finite points inspected.
    pub sampled: usize,
    /// Why the heuristic settled where it did.
    pub diagnostics: Vec<String>,
}

impl SystemSuggestion {
    pub fn is_none(&self) -> bool {
        self.code == NONE
    }
}

/// Pick up to [`MAX_SAMPLES`] finite points, evenly strided over the input.
pub fn sample_points(points: &[Point]) -> Vec<Point> {
    let finite: Vec<&Point> = points.iter().filter(|p| p.is_valid()).collect();
    let step = finite.len().div_ceil(MAX_SAMPLES).max(1);
    finite.into_iter().step_by(step).take(MAX_SAMPLES).copied().collect()
}

/// Guess the coordinate system of a point set.
pub fn suggest_coordinate_system(points: &[Point]) -> SystemSuggestion {
    let samples = sample_points(points);
    let sampled = samples.len();
    let mut diagnostics = Vec::new();

    if samples.is_empty() {
        diagnostics.push("no finite coordinates to sample".to_string());
        return SystemSuggestion {
            code: NONE.to_string(),
            ratio: 0.0,
            sampled,
            diagnostics,
        };
    }

    let mut best_ratio = 0.0_f64;
    for signature in [LV95_SIGNATURE, LV03_SIGNATURE] {
        let hits = samples.iter().filter(|p| signature.matches(p)).count();
        let ratio = hits as f64 / sampled as f64;
        if ratio >= MATCH_RATIO {
            return SystemSuggestion {
                code: signature.code.to_string(),
                ratio,
                sampled,
                diagnostics,
            };
        }
        if hits > 0 {
            diagnostics.push(format!(
                "{} of {} samples match {} (ratio {:.2} below {:.2})",
                hits, sampled, signature.code, ratio, MATCH_RATIO
            ));
        }
        best_ratio = best_ratio.max(ratio);
    }

    let in_range = samples
        .iter()
        .all(|p| p.x.abs() <= 180.0 && p.y.abs() <= 90.0);
    let fractional = samples.iter().all(Point::has_fraction);

    if in_range && fractional {
        return SystemSuggestion {
            code: WGS84.to_string(),
            ratio: 1.0,
            sampled,
            diagnostics,
        };
    }
    if in_range {
        diagnostics.push(
            "samples are within lon/lat range but integral; not treated as WGS84".to_string(),
        );
    } else {
        diagnostics.push("samples are outside the lon/lat range".to_string());
    }

    SystemSuggestion {
        code: NONE.to_string(),
        ratio: best_ratio,
        sampled,
        diagnostics,
    }
}
