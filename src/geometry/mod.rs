pub mod projection;
pub mod shapes;
pub mod validation;

use serde::{Deserialize, Serialize};

/// A 2D or 3D point.
///
/// The point carries no coordinate system tag: whether `x`/`y` are degrees
/// or meters depends entirely on the system it is currently expressed in.
///
/// # Example
///
/// ```rust
/// use geoloader::Point;
///
/// let p = Point::new(2600000.0, 1200000.0);
/// assert!(p.is_valid());
///
/// let p2: Point = (2600000.0, 1200000.0).into();
/// assert_eq!(p, p2);
///
/// let with_height = Point::lonlat(7.44, 46.95).with_z(540.0);
/// assert_eq!(with_height.z, Some(540.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate (easting or longitude)
    pub x: f64,
    /// Y coordinate (northing or latitude)
    pub y: f64,
    /// Optional height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Point {
    /// Create a new 2D point.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Create a point from longitude and latitude.
    #[inline]
    #[must_use]
    pub fn lonlat(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat)
    }

    /// Attach a height to this point.
    #[inline]
    #[must_use]
    pub fn with_z(self, z: f64) -> Self {
        Self { z: Some(z), ..self }
    }

    /// Create a point at the origin (0, 0).
    #[inline]
    #[must_use]
    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// True when `x` and `y` are finite. A present `z` must be finite too.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }

    /// True when either horizontal component has a fractional part.
    #[inline]
    #[must_use]
    pub fn has_fraction(&self) -> bool {
        self.x.fract() != 0.0 || self.y.fract() != 0.0
    }

    /// Convert to a tuple (x, y).
    #[inline]
    #[must_use]
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Euclidean distance in the plane.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Build a point from a GeoJSON position (`[x, y]` or `[x, y, z]`).
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [x, y] => Some(Self::new(*x, *y)),
            [x, y, z, ..] => Some(Self::new(*x, *y).with_z(*z)),
            _ => None,
        }
    }

    /// Convert to a GeoJSON position.
    pub fn to_position(&self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.x, self.y, z],
            None => vec![self.x, self.y],
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::origin()
    }
}

impl From<(f64, f64)> for Point {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<(f64, f64, f64)> for Point {
    #[inline]
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y).with_z(z)
    }
}

impl From<[f64; 2]> for Point {
    #[inline]
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for (f64, f64) {
    #[inline]
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Axis-aligned bounding box in some coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create a new bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// An inverted box that any `extend` call will replace.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// True until at least one finite point has been added.
    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    /// True when all four values are finite and min <= max on both axes.
    pub fn is_well_formed(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && !self.is_empty()
    }

    /// Grow the box to include `point`. Non-finite points are ignored.
    pub fn extend(&mut self, point: &Point) {
        if !point.x.is_finite() || !point.y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    /// Grow the box to include another box.
    pub fn union(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// The four corners, counter-clockwise from the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }

    /// Bounds of a point set, or `None` when no point is finite.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut bounds = Self::empty();
        for p in points {
            bounds.extend(p);
        }
        (!bounds.is_empty()).then_some(bounds)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_new() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(p.x, 10.0);
        assert_eq!(p.y, 20.0);
        assert_eq!(p.z, None);
    }

    #[test]
    fn test_point_validity() {
        assert!(Point::new(1.0, 2.0).is_valid());
        assert!(!Point::new(f64::NAN, 2.0).is_valid());
        assert!(!Point::new(1.0, f64::INFINITY).is_valid());
        assert!(!Point::new(1.0, 2.0).with_z(f64::NAN).is_valid());
    }

    #[test]
    fn test_point_fraction() {
        assert!(Point::new(7.5, 46.0).has_fraction());
        assert!(!Point::new(100.0, 200.0).has_fraction());
    }

    #[test]
    fn test_point_positions() {
        assert_eq!(Point::from_position(&[1.0, 2.0]), Some(Point::new(1.0, 2.0)));
        assert_eq!(
            Point::from_position(&[1.0, 2.0, 3.0]),
            Some(Point::new(1.0, 2.0).with_z(3.0))
        );
        assert_eq!(Point::from_position(&[1.0]), None);
        assert_eq!(Point::new(1.0, 2.0).with_z(3.0).to_position(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_point_from_tuple() {
        let p: Point = (5.0, 10.0).into();
        assert_eq!(p.to_tuple(), (5.0, 10.0));
    }

    #[test]
    fn test_point_distance() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_bounds_extend_and_contains() {
        let mut b = Bounds::empty();
        assert!(b.is_empty());
        b.extend(&Point::new(1.0, 1.0));
        b.extend(&Point::new(3.0, -2.0));
        b.extend(&Point::new(f64::NAN, 100.0));
        assert_eq!(b, Bounds::new(1.0, -2.0, 3.0, 1.0));
        assert!(b.contains(&Point::new(2.0, 0.0)));
        assert!(!b.contains(&Point::new(4.0, 0.0)));
    }

    #[test]
    fn test_bounds_union() {
        let mut a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        a.union(&Bounds::new(-1.0, 0.5, 0.5, 2.0));
        assert_eq!(a, Bounds::new(-1.0, 0.0, 1.0, 2.0));
        a.union(&Bounds::empty());
        assert_eq!(a, Bounds::new(-1.0, 0.0, 1.0, 2.0));
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [Point::new(2.0, 3.0), Point::new(-1.0, 5.0)];
        let b = Bounds::from_points(&points).unwrap();
        assert_eq!(b, Bounds::new(-1.0, 3.0, 2.0, 5.0));
        assert!(Bounds::from_points(&Vec::<Point>::new()).is_none());
    }
}
