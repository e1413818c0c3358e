//! Turning extracted street names into a map location.

use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::GeolocationConfig;
use crate::models::CharacterizedInstance;

/// Others are only used when no street name was found
const MAX_FALLBACK_TERMS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationQuery {
    pub streets: Vec<String>,
    pub others: Vec<String>,
}

impl LocationQuery {
    /// Trimmed, non-empty texts with repeats removed, order kept
    pub fn new(streets: &[CharacterizedInstance], others: &[CharacterizedInstance]) -> Self {
        Self {
            streets: unique_texts(streets),
            others: unique_texts(others),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streets.is_empty() && self.others.is_empty()
    }

    /// Single-line search text, e.g. "MAIN ST & ELM ST"
    pub fn free_form(&self) -> String {
        if self.streets.is_empty() {
            self.others
                .iter()
                .take(MAX_FALLBACK_TERMS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            self.streets.join(" & ")
        }
    }
}

fn unique_texts(instances: &[CharacterizedInstance]) -> Vec<String> {
    let mut texts: Vec<String> = Vec::new();
    for instance in instances {
        let text = instance.text().trim();
        if !text.is_empty() && !texts.iter().any(|t| t.eq_ignore_ascii_case(text)) {
            texts.push(text.to_string());
        }
    }
    texts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    Found(Vec<Location>),
    NotFound,
    /// The service failed or timed out; detection results are unaffected
    Failed(String),
}

impl std::fmt::Display for LocationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationOutcome::Found(locations) => {
                write!(f, "found:")?;
                for location in locations {
                    write!(
                        f,
                        "\n\t{:.6}, {:.6}\t{}",
                        location.lat, location.lon, location.display_name
                    )?;
                }
                Ok(())
            }
            LocationOutcome::NotFound => write!(f, "not found"),
            LocationOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

pub trait LocationSearch {
    fn search_location(
        &self,
        query: &LocationQuery,
    ) -> impl Future<Output = anyhow::Result<Vec<Location>>>;
}

/// Query `search` with the classified texts, giving up after `timeout`.
pub async fn locate<L: LocationSearch>(
    search: &L,
    streets: &[CharacterizedInstance],
    others: &[CharacterizedInstance],
    timeout: Duration,
) -> LocationOutcome {
    let query = LocationQuery::new(streets, others);
    if query.is_empty() {
        info!("Nothing to search for");
        return LocationOutcome::NotFound;
    }

    debug!("Searching location for {:?}", query.free_form());
    match tokio::time::timeout(timeout, search.search_location(&query)).await {
        Err(_) => {
            warn!("Location search timed out after {:?}", timeout);
            LocationOutcome::Failed(format!("timed out after {:?}", timeout))
        }
        Ok(Err(e)) => {
            warn!("Location search failed: {:#}", e);
            LocationOutcome::Failed(format!("{:#}", e))
        }
        Ok(Ok(locations)) if locations.is_empty() => LocationOutcome::NotFound,
        Ok(Ok(locations)) => {
            info!("Found {} candidate locations", locations.len());
            LocationOutcome::Found(locations)
        }
    }
}

/// Free-form search against an OpenStreetMap Nominatim endpoint
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    config: GeolocationConfig,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimClient {
    pub fn new(config: GeolocationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    fn search_text(&self, query: &LocationQuery) -> String {
        match &self.config.region_hint {
            Some(hint) => format!("{}, {}", query.free_form(), hint),
            None => query.free_form(),
        }
    }
}

impl LocationSearch for NominatimClient {
    async fn search_location(&self, query: &LocationQuery) -> anyhow::Result<Vec<Location>> {
        let text = self.search_text(query);
        let limit = self.config.max_results.to_string();

        let places: Vec<NominatimPlace> = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", text.as_str()), ("format", "json"), ("limit", limit.as_str())])
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.config.endpoint))?
            .error_for_status()?
            .json()
            .await
            .context("Unexpected response from location service")?;

        places
            .into_iter()
            .map(|place| -> anyhow::Result<Location> {
                Ok(Location {
                    lat: place.lat.parse().with_context(|| format!("Bad latitude {:?}", place.lat))?,
                    lon: place.lon.parse().with_context(|| format!("Bad longitude {:?}", place.lon))?,
                    display_name: place.display_name,
                })
            })
            .collect()
    }
}
