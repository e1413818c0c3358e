//! Cross-window deduplication of text detections.
//!
//! Neighbouring windows overlap, so the same sign is usually detected more than
//! once. A candidate is a duplicate of a known instance when the polygons
//! overlap above the IoU threshold and the texts match case-insensitively
//! within a small edit distance.

use log::{debug, warn};

use crate::config::{ConflictPolicy, DedupConfig};
use crate::error::SceneError;
use crate::geometry;
use crate::models::TextInstance;

/// Outcome of one deduplication batch
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    /// Candidates that are genuinely new, in input order
    pub accepted: Vec<TextInstance>,
    /// Candidates dropped for unusable geometry
    pub discarded: Vec<SceneError>,
}

#[derive(Debug, Clone, Default)]
pub struct DeduplicationEngine {
    config: DedupConfig,
}

impl DeduplicationEngine {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Subset of `candidates` not already present in `existing`.
    ///
    /// Candidates are also compared against each other, so an in-window
    /// duplicate yields a single instance.
    pub fn merge_new(
        &self,
        existing: &[TextInstance],
        candidates: Vec<TextInstance>,
    ) -> Vec<TextInstance> {
        self.merge_new_report(existing, candidates).accepted
    }

    pub fn merge_new_report(
        &self,
        existing: &[TextInstance],
        candidates: Vec<TextInstance>,
    ) -> DedupReport {
        let mut report = DedupReport::default();

        for candidate in candidates {
            if let Err(e) = self.check_geometry(&candidate) {
                warn!("Discarding detection: {}", e);
                report.discarded.push(e);
                continue;
            }

            if existing.iter().any(|known| self.is_duplicate(known, &candidate)) {
                debug!("Skipping already known word {:?}", candidate.text);
                continue;
            }

            let twins: Vec<usize> = report
                .accepted
                .iter()
                .enumerate()
                .filter(|(_, accepted)| self.is_duplicate(accepted, &candidate))
                .map(|(idx, _)| idx)
                .collect();

            let Some(&first) = twins.first() else {
                report.accepted.push(candidate);
                continue;
            };

            match self.config.policy {
                ConflictPolicy::KeepFirst => {
                    debug!("Skipping in-batch duplicate {:?}", candidate.text);
                }
                ConflictPolicy::KeepBest => {
                    let best = twins
                        .iter()
                        .map(|&idx| report.accepted[idx].confidence)
                        .fold(f32::NEG_INFINITY, f32::max);
                    if candidate.confidence <= best {
                        continue;
                    }

                    // The winner stands for every twin it overlaps
                    debug!(
                        "Replacing {} duplicate(s) of {:?} with higher-confidence {:?} ({:.2})",
                        twins.len(),
                        report.accepted[first].text,
                        candidate.text,
                        candidate.confidence
                    );
                    for &idx in twins.iter().rev() {
                        report.accepted.remove(idx);
                    }
                    report.accepted.insert(first, candidate);
                }
            }
        }

        report
    }

    pub fn is_duplicate(&self, a: &TextInstance, b: &TextInstance) -> bool {
        texts_match(&a.text, &b.text, &self.config)
            && geometry::iou(a.bbox.points(), b.bbox.points()) > self.config.iou_threshold
    }

    fn check_geometry(&self, candidate: &TextInstance) -> Result<(), SceneError> {
        let distinct = candidate.bbox.distinct_vertices();
        if distinct < 3 {
            return Err(SceneError::DegenerateGeometry {
                text: candidate.text.clone(),
                reason: format!("only {} distinct vertices", distinct),
            });
        }

        let area = candidate.bbox.area();
        if !area.is_finite() || area <= self.config.min_area {
            return Err(SceneError::DegenerateGeometry {
                text: candidate.text.clone(),
                reason: format!("area {:.3} too small", area),
            });
        }

        Ok(())
    }
}

/// Running list of unique detections, fed one window at a time
#[derive(Debug, Clone, Default)]
pub struct DetectionAccumulator {
    engine: DeduplicationEngine,
    words: Vec<TextInstance>,
    discarded: usize,
}

impl DetectionAccumulator {
    pub fn new(engine: DeduplicationEngine) -> Self {
        Self {
            engine,
            words: Vec::new(),
            discarded: 0,
        }
    }

    /// Append the new words of one window; returns how many were added
    pub fn push_window(&mut self, candidates: Vec<TextInstance>) -> usize {
        let report = self.engine.merge_new_report(&self.words, candidates);
        self.discarded += report.discarded.len();
        let added = report.accepted.len();
        self.words.extend(report.accepted);
        added
    }

    pub fn words(&self) -> &[TextInstance] {
        &self.words
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn into_words(self) -> Vec<TextInstance> {
        self.words
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Exact match after normalizing, or a small edit distance for texts long
/// enough that one typo cannot turn them into another word
fn texts_match(a: &str, b: &str, config: &DedupConfig) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return true;
    }

    let shorter = a.chars().count().min(b.chars().count());
    shorter >= config.min_fuzzy_len && levenshtein(&a, &b) <= config.max_edit_distance
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
