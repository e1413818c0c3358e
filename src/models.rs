use serde::{Deserialize, Serialize};

use crate::geometry;

/// A point in panorama pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Side ratio above which a box counts as square for corner ordering
const SQUARE_RATIO: f32 = 0.9;

/// Four-vertex polygon of a text region. Not necessarily axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// Axis-aligned rectangle, vertices clockwise from the top-left corner
    pub fn from_rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// Reorder arbitrary corners as top-left, top-right, bottom-right, bottom-left.
    ///
    /// Corners are sorted by angle around the centroid (clockwise on screen, since
    /// y grows downwards). The top edge is the long edge running left to right, so
    /// the orientation survives tilts past 45 degrees. Near-square boxes have no
    /// long edge and start at the edge pointing most to the right.
    pub fn ordered(points: [Point; 4]) -> Self {
        let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

        let mut sorted = points;
        sorted.sort_by(|a, b| {
            let angle_a = (a.y - cy).atan2(a.x - cx);
            let angle_b = (b.y - cy).atan2(b.x - cx);
            angle_a
                .partial_cmp(&angle_b)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let edge = |i: usize| {
            let (a, b) = (sorted[i], sorted[(i + 1) % 4]);
            (b.x - a.x, b.y - a.y)
        };
        let length = |i: usize| {
            let (dx, dy) = edge(i);
            (dx * dx + dy * dy).sqrt()
        };

        let (even, odd) = (length(0) + length(2), length(1) + length(3));
        let candidates: &[usize] = if even.min(odd) >= SQUARE_RATIO * even.max(odd) {
            &[0, 1, 2, 3]
        } else if even > odd {
            &[0, 2]
        } else {
            &[1, 3]
        };

        let start = candidates
            .iter()
            .copied()
            .max_by(|&i, &j| {
                let (a, b) = (edge(i), edge(j));
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            })
            .unwrap_or(0);
        sorted.rotate_left(start);

        Self(sorted)
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn area(&self) -> f32 {
        geometry::polygon_area(&self.0)
    }

    pub fn distinct_vertices(&self) -> usize {
        geometry::distinct_vertices(&self.0)
    }

    /// (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.0.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        )
    }

    pub fn centroid(&self) -> Point {
        Point::new(
            self.0.iter().map(|p| p.x).sum::<f32>() / 4.0,
            self.0.iter().map(|p| p.y).sum::<f32>() / 4.0,
        )
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self(self.0.map(|p| Point::new(p.x + dx, p.y + dy)))
    }

    /// Direction of the top edge in radians
    pub fn angle(&self) -> f32 {
        let [tl, tr, _, _] = self.0;
        (tr.y - tl.y).atan2(tr.x - tl.x)
    }

    /// Mean length of the top and bottom edges
    pub fn width(&self) -> f32 {
        let [tl, tr, br, bl] = self.0;
        (geometry::distance(tl, tr) + geometry::distance(bl, br)) / 2.0
    }

    /// Mean length of the left and right edges
    pub fn height(&self) -> f32 {
        let [tl, tr, br, bl] = self.0;
        (geometry::distance(tl, bl) + geometry::distance(tr, br)) / 2.0
    }

    pub fn aspect_ratio(&self) -> f32 {
        let h = self.height();
        if h <= f32::EPSILON {
            return 0.0;
        }
        self.width() / h
    }
}

/// A recognized text region as produced by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInstance {
    pub bbox: Quad,
    pub text: String,
    pub confidence: f32,
}

impl TextInstance {
    pub fn new(bbox: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }

    /// Shift into another coordinate frame (e.g. window-local to panorama)
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            bbox: self.bbox.translated(dx, dy),
            text: self.text.clone(),
            confidence: self.confidence,
        }
    }
}

/// Normal-distribution summary of the HSV values inside a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorFingerprint {
    pub hue_mean: f64,
    pub hue_std: f64,
    pub sat_mean: f64,
    pub sat_std: f64,
    pub val_mean: f64,
    pub val_std: f64,
}

/// Hue range of the 8-bit HSV encoding
pub const HUE_RANGE: f64 = 180.0;

impl ColorFingerprint {
    /// Euclidean distance between channel means, hue measured around the circle
    pub fn mean_distance_to(&self, hue: f64, sat: f64, val: f64) -> f64 {
        let dh = (self.hue_mean - hue).abs() % HUE_RANGE;
        let dh = dh.min(HUE_RANGE - dh);
        let ds = self.sat_mean - sat;
        let dv = self.val_mean - val;
        (dh * dh + ds * ds + dv * dv).sqrt()
    }

    pub fn mean_distance(&self, other: &ColorFingerprint) -> f64 {
        self.mean_distance_to(other.hue_mean, other.sat_mean, other.val_mean)
    }
}

/// A text region with its color fingerprint and street classification state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizedInstance {
    pub instance: TextInstance,
    pub fingerprint: ColorFingerprint,
    pub is_in_street_list: bool,
    pub grade: f32,
    /// Words consumed by a merge; empty when the region is a single detection
    pub parts: Vec<TextInstance>,
}

impl CharacterizedInstance {
    pub fn new(instance: TextInstance, fingerprint: ColorFingerprint) -> Self {
        Self {
            instance,
            fingerprint,
            is_in_street_list: false,
            grade: 0.0,
            parts: Vec::new(),
        }
    }

    pub fn merged(
        instance: TextInstance,
        fingerprint: ColorFingerprint,
        parts: Vec<TextInstance>,
    ) -> Self {
        Self {
            parts,
            ..Self::new(instance, fingerprint)
        }
    }

    pub fn is_merged(&self) -> bool {
        !self.parts.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.instance.text
    }

    pub fn bbox(&self) -> &Quad {
        &self.instance.bbox
    }
}

/// Either a bare detection or one that already carries a color fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Raw(TextInstance),
    Characterized(CharacterizedInstance),
}

impl Detection {
    pub fn instance(&self) -> &TextInstance {
        match self {
            Detection::Raw(instance) => instance,
            Detection::Characterized(characterized) => &characterized.instance,
        }
    }

    pub fn bbox(&self) -> &Quad {
        &self.instance().bbox
    }

    pub fn text(&self) -> &str {
        &self.instance().text
    }

    pub fn confidence(&self) -> f32 {
        self.instance().confidence
    }
}

impl From<TextInstance> for Detection {
    fn from(instance: TextInstance) -> Self {
        Detection::Raw(instance)
    }
}

impl From<CharacterizedInstance> for Detection {
    fn from(characterized: CharacterizedInstance) -> Self {
        Detection::Characterized(characterized)
    }
}
