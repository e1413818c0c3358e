//! Planar polygon helpers for text regions.
//!
//! Polygons are plain point slices in image coordinates. Hulls returned here are
//! counter-clockwise in the mathematical sense (clockwise on screen).

use crate::models::{Point, Quad};

/// Vertices closer than this are treated as the same vertex
const VERTEX_EPSILON: f32 = 1e-3;

pub fn distance(a: Point, b: Point) -> f32 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Shoelace area. Returns 0.0 for fewer than 3 points.
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

pub fn distinct_vertices(points: &[Point]) -> usize {
    let mut seen: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.iter().any(|q| distance(*p, *q) < VERTEX_EPSILON) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// Convex hull by Andrew's monotone chain; collinear points are dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup_by(|a, b| distance(*a, *b) < VERTEX_EPSILON);

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Sutherland-Hodgman clipping of `subject` by the convex, counter-clockwise `clip`.
fn clip_convex(subject: &[Point], clip: &[Point]) -> Vec<Point> {
    let mut output = subject.to_vec();

    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let edge_start = clip[i];
        let edge_end = clip[(i + 1) % clip.len()];
        let input = std::mem::take(&mut output);

        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            let current_inside = cross(edge_start, edge_end, current) >= 0.0;
            let previous_inside = cross(edge_start, edge_end, previous) >= 0.0;

            if current_inside {
                if !previous_inside {
                    output.push(line_intersection(previous, current, edge_start, edge_end));
                }
                output.push(current);
            } else if previous_inside {
                output.push(line_intersection(previous, current, edge_start, edge_end));
            }
        }
    }

    output
}

fn line_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Point {
    let d1 = Point::new(p2.x - p1.x, p2.y - p1.y);
    let d2 = Point::new(q2.x - q1.x, q2.y - q1.y);
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < f32::EPSILON {
        return p2;
    }
    let t = ((q1.x - p1.x) * d2.y - (q1.y - p1.y) * d2.x) / denom;
    Point::new(p1.x + t * d1.x, p1.y + t * d1.y)
}

/// Intersection over union of two polygons, measured on their convex hulls.
pub fn iou(a: &[Point], b: &[Point]) -> f32 {
    let hull_a = convex_hull(a);
    let hull_b = convex_hull(b);
    let area_a = polygon_area(&hull_a);
    let area_b = polygon_area(&hull_b);
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let intersection = polygon_area(&clip_convex(&hull_a, &hull_b));
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

/// Smallest-area rectangle enclosing all points, as an ordered quad.
///
/// Tries every hull edge as a rectangle side (rotating calipers without the
/// caliper bookkeeping). Fewer than 3 hull points fall back to the
/// axis-aligned bounds.
pub fn min_area_rect(points: &[Point]) -> Quad {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        );
        return Quad::from_rect(min_x, min_y, max_x, max_y);
    }

    let mut best: Option<(f32, [Point; 4])> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let len = distance(a, b);
        if len < VERTEX_EPSILON {
            continue;
        }
        let u = Point::new((b.x - a.x) / len, (b.y - a.y) / len);
        let n = Point::new(-u.y, u.x);

        let (mut min_u, mut max_u, mut min_n, mut max_n) =
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY);
        for p in &hull {
            let pu = p.x * u.x + p.y * u.y;
            let pn = p.x * n.x + p.y * n.y;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_n = min_n.min(pn);
            max_n = max_n.max(pn);
        }

        let area = (max_u - min_u) * (max_n - min_n);
        if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
            let corner = |su: f32, sn: f32| Point::new(su * u.x + sn * n.x, su * u.y + sn * n.y);
            best = Some((
                area,
                [
                    corner(min_u, min_n),
                    corner(max_u, min_n),
                    corner(max_u, max_n),
                    corner(min_u, max_n),
                ],
            ));
        }
    }

    match best {
        Some((_, corners)) => Quad::ordered(corners),
        None => Quad::from_rect(hull[0].x, hull[0].y, hull[0].x, hull[0].y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
        Quad::from_rect(x0, y0, x1, y1).0.to_vec()
    }

    #[test]
    fn iou_identical_is_one() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn iou_half_overlap() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn iou_disjoint_is_zero() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(20.0, 0.0, 30.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn hull_drops_interior_points() {
        let mut pts = rect(0.0, 0.0, 4.0, 4.0);
        pts.push(Point::new(2.0, 2.0));
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!((polygon_area(&hull) - 16.0).abs() < 1e-5);
    }

    #[test]
    fn min_area_rect_of_two_touching_boxes() {
        let mut pts = rect(0.0, 0.0, 40.0, 10.0);
        pts.extend(rect(40.0, 0.0, 60.0, 10.0));
        let quad = min_area_rect(&pts);
        assert!((quad.area() - 600.0).abs() < 1e-2);
        let (min_x, min_y, max_x, max_y) = quad.bounds();
        assert!(min_x.abs() < 1e-3 && min_y.abs() < 1e-3);
        assert!((max_x - 60.0).abs() < 1e-3 && (max_y - 10.0).abs() < 1e-3);
    }

    #[test]
    fn ordered_starts_top_left_clockwise() {
        let quad = Quad::ordered([
            Point::new(10.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(10.0, 0.0),
        ]);
        assert_eq!(quad, Quad::from_rect(0.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn ordered_follows_long_edge_past_diagonal() {
        let angle = 60f32.to_radians();
        let (u, n) = ((angle.cos(), angle.sin()), (-angle.sin(), angle.cos()));
        let corner = |a: f32, b: f32| Point::new(50.0 + a * u.0 + b * n.0, a * u.1 + b * n.1);

        let quad = Quad::ordered([
            corner(0.0, 10.0),
            corner(40.0, 0.0),
            corner(0.0, 0.0),
            corner(40.0, 10.0),
        ]);

        assert!((quad.angle() - angle).abs() < 1e-4);
        assert!((quad.width() - 40.0).abs() < 1e-3);
        assert!((quad.height() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn collapsed_quad_has_few_distinct_vertices() {
        let p = Point::new(3.0, 3.0);
        let q = Point::new(5.0, 3.0);
        assert_eq!(distinct_vertices(&[p, p, q, q]), 2);
    }
}
