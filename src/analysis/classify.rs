use std::collections::HashSet;

use log::debug;

use crate::config::ClassifierConfig;
use crate::models::CharacterizedInstance;

/// Scores text regions and splits them into street names and other signage
#[derive(Debug, Clone)]
pub struct StreetClassifier {
    config: ClassifierConfig,
    suffixes: HashSet<String>,
    panorama_height: Option<u32>,
}

impl StreetClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let suffixes = config
            .street_suffixes
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect();

        Self {
            config,
            suffixes,
            panorama_height: None,
        }
    }

    /// Enables the size cue, which compares region height to the panorama's
    pub fn with_panorama_height(mut self, height: u32) -> Self {
        self.panorama_height = (height > 0).then_some(height);
        self
    }

    /// Heuristic contribution of one region. Blank text scores nothing.
    pub fn score(&self, instance: &CharacterizedInstance) -> f32 {
        let tokens = tokens(instance.text());
        if tokens.is_empty() {
            return 0.0;
        }

        let mut grade = 0.0;

        if tokens.iter().any(|t| self.suffixes.contains(t)) {
            grade += self.config.suffix_weight;
        }
        if tokens.iter().all(|t| t.chars().all(|c| c.is_ascii_digit())) {
            grade += self.config.numeric_penalty;
        }

        let bbox = instance.bbox();
        let (min_aspect, max_aspect) = self.config.aspect_range;
        let aspect = bbox.aspect_ratio();
        if aspect >= min_aspect && aspect <= max_aspect {
            grade += self.config.aspect_weight;
        }

        if let Some(height) = self.panorama_height {
            let (min_rel, max_rel) = self.config.relative_height_range;
            let relative = bbox.height() / height as f32;
            if relative >= min_rel && relative <= max_rel {
                grade += self.config.size_weight;
            }
        }

        if let Some(reference) = self.config.reference_color {
            let distance =
                instance
                    .fingerprint
                    .mean_distance_to(reference.hue, reference.sat, reference.val);
            let similarity = 1.0 - (distance / self.config.color_scale).min(1.0);
            grade += self.config.color_weight * similarity as f32;
        }

        grade
    }

    /// Split into (streets, others), both in input order
    pub fn classify(
        &self,
        instances: Vec<CharacterizedInstance>,
    ) -> (Vec<CharacterizedInstance>, Vec<CharacterizedInstance>) {
        let mut streets = Vec::new();
        let mut others = Vec::new();

        for mut instance in instances {
            instance.grade += self.score(&instance);
            instance.is_in_street_list =
                !instance.text().trim().is_empty() && instance.grade > self.config.threshold;

            debug!(
                "{:?}: grade {:.2} -> {}",
                instance.text(),
                instance.grade,
                if instance.is_in_street_list { "street" } else { "other" }
            );

            if instance.is_in_street_list {
                streets.push(instance);
            } else {
                others.push(instance);
            }
        }

        (streets, others)
    }
}

/// Upper-cased alphanumeric tokens; punctuation is stripped ("St." -> "ST")
fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}
