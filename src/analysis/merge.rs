//! Joins neighbouring words into composite labels ("MAIN" + "ST" -> "MAIN ST").
//!
//! Adjacency is a symmetric pairwise test; groups are the connected components
//! of that relation, so the result does not depend on input order.

use std::f32::consts::{FRAC_PI_2, PI};

use log::{debug, warn};

use crate::analysis::color::ColorProfiler;
use crate::config::MergeConfig;
use crate::error::SceneError;
use crate::geometry;
use crate::models::{CharacterizedInstance, Detection, Point, Quad, TextInstance};

#[derive(Debug, Clone, Default)]
pub struct WordMerger {
    config: MergeConfig,
}

impl WordMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Group adjacent words and emit one characterized instance per group.
    ///
    /// Raw detections are profiled first. Merged groups get a fresh fingerprint
    /// computed on their new polygon. Output follows the first input index of
    /// each group.
    pub fn merge(
        &self,
        instances: Vec<Detection>,
        profiler: &ColorProfiler,
    ) -> Vec<CharacterizedInstance> {
        let characterized = profiler.characterize(instances);
        let n = characterized.len();

        let mut sets = DisjointSet::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if self.are_adjacent(&characterized[i], &characterized[j]) {
                    sets.union(i, j);
                }
            }
        }

        let mut slots: Vec<Option<CharacterizedInstance>> =
            characterized.into_iter().map(Some).collect();
        let mut merged = Vec::new();

        for group in sets.groups() {
            let members: Vec<CharacterizedInstance> =
                group.iter().filter_map(|&idx| slots[idx].take()).collect();

            if members.len() < 2 {
                merged.extend(members);
                continue;
            }

            match combine(members, profiler) {
                Ok(instance) => {
                    debug!("Merged {} words into {:?}", instance.parts.len(), instance.text());
                    merged.push(instance);
                }
                Err((e, members)) => {
                    warn!("Keeping words unmerged: {}", e);
                    merged.extend(members);
                }
            }
        }

        merged
    }

    /// Whether two words read as consecutive parts of one label
    pub fn are_adjacent(&self, a: &CharacterizedInstance, b: &CharacterizedInstance) -> bool {
        let angle_a = a.bbox().angle();
        let angle_b = b.bbox().angle();
        if angle_difference(angle_a, angle_b).abs() > self.config.max_angle_deg.to_radians() {
            return false;
        }

        let Some(frame) = ReadingFrame::shared(angle_a, angle_b) else {
            return false;
        };
        let ea = frame.extent(a.bbox());
        let eb = frame.extent(b.bbox());

        let (ha, hb) = (ea.height(), eb.height());
        if ha <= f32::EPSILON || hb <= f32::EPSILON {
            return false;
        }
        if ha.min(hb) / ha.max(hb) < self.config.min_height_ratio {
            return false;
        }

        let mean_height = (ha + hb) / 2.0;
        if (ea.max_n - eb.max_n).abs() > self.config.baseline_tolerance * mean_height {
            return false;
        }

        let gap = (eb.min_u - ea.max_u).max(ea.min_u - eb.max_u);
        if gap > self.config.max_gap_ratio * mean_height
            || gap < -self.config.max_overlap_ratio * mean_height
        {
            return false;
        }

        match self.config.max_color_distance {
            Some(max) => a.fingerprint.mean_distance(&b.fingerprint) <= max,
            None => true,
        }
    }
}

fn combine(
    mut members: Vec<CharacterizedInstance>,
    profiler: &ColorProfiler,
) -> Result<CharacterizedInstance, (SceneError, Vec<CharacterizedInstance>)> {
    let (sx, sy) = members.iter().fold((0.0f32, 0.0f32), |(sx, sy), m| {
        let angle = m.bbox().angle();
        (sx + angle.cos(), sy + angle.sin())
    });
    let direction = normalized(sx, sy).unwrap_or(Point::new(1.0, 0.0));

    members.sort_by(|a, b| {
        let pa = project(a.bbox().centroid(), direction);
        let pb = project(b.bbox().centroid(), direction);
        pa.partial_cmp(&pb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text().cmp(b.text()))
    });

    let points: Vec<Point> = members
        .iter()
        .flat_map(|m| m.bbox().points().iter().copied())
        .collect();
    let bbox = geometry::min_area_rect(&points);

    let fingerprint = match profiler.profile(&bbox) {
        Ok(fingerprint) => fingerprint,
        Err(e) => return Err((e, members)),
    };

    let text = members
        .iter()
        .map(|m| m.text().trim())
        .collect::<Vec<_>>()
        .join(" ");
    let confidence = members
        .iter()
        .map(|m| m.instance.confidence)
        .fold(f32::INFINITY, f32::min);

    let parts: Vec<TextInstance> = members
        .into_iter()
        .flat_map(|m| {
            if m.is_merged() {
                m.parts
            } else {
                vec![m.instance]
            }
        })
        .collect();

    Ok(CharacterizedInstance::merged(
        TextInstance::new(bbox, text, confidence),
        fingerprint,
        parts,
    ))
}

/// Signed difference of two line directions, folded into [-pi/2, pi/2)
fn angle_difference(a: f32, b: f32) -> f32 {
    (a - b + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2
}

fn normalized(x: f32, y: f32) -> Option<Point> {
    let len = (x * x + y * y).sqrt();
    (len > f32::EPSILON).then(|| Point::new(x / len, y / len))
}

fn project(p: Point, axis: Point) -> f32 {
    p.x * axis.x + p.y * axis.y
}

/// Orthonormal axes: `u` along the text, `n` towards the baseline
struct ReadingFrame {
    u: Point,
    n: Point,
}

impl ReadingFrame {
    fn shared(angle_a: f32, angle_b: f32) -> Option<Self> {
        let (ua, ub) = ((angle_a.cos(), angle_a.sin()), (angle_b.cos(), angle_b.sin()));
        // Upside-down twin: flip so the directions reinforce
        let flip = if ua.0 * ub.0 + ua.1 * ub.1 < 0.0 { -1.0 } else { 1.0 };
        let sum = normalized(ua.0 + flip * ub.0, ua.1 + flip * ub.1)?;
        // Swapping the arguments negates the sum; pin it to point right (or down)
        let u = if sum.x < 0.0 || (sum.x == 0.0 && sum.y < 0.0) {
            Point::new(-sum.x, -sum.y)
        } else {
            sum
        };
        Some(Self {
            u,
            n: Point::new(-u.y, u.x),
        })
    }

    fn extent(&self, quad: &Quad) -> Extent {
        quad.points().iter().fold(
            Extent {
                min_u: f32::INFINITY,
                max_u: f32::NEG_INFINITY,
                min_n: f32::INFINITY,
                max_n: f32::NEG_INFINITY,
            },
            |e, p| {
                let pu = project(*p, self.u);
                let pn = project(*p, self.n);
                Extent {
                    min_u: e.min_u.min(pu),
                    max_u: e.max_u.max(pu),
                    min_n: e.min_n.min(pn),
                    max_n: e.max_n.max(pn),
                }
            },
        )
    }
}

struct Extent {
    min_u: f32,
    max_u: f32,
    min_n: f32,
    max_n: f32,
}

impl Extent {
    fn height(&self) -> f32 {
        self.max_n - self.min_n
    }
}

/// Union-find with the smallest index as representative
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }

    /// Members of each set, sets ordered by their smallest index
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for idx in 0..n {
            let root = self.find(idx);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(idx),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![idx]);
                }
            }
        }

        groups
    }
}
