//! Geocoding client
//!
//! Resolves free-text addresses to coordinates. Each address is walked down
//! the [`CandidateLadder`]; every rung is checked against the
//! [`AddressCache`] first and only then sent to the provider. All outbound
//! requests share one rate gate.
//!
//! A hit on any rung, from the provider or from the cache, is stored under
//! the original address, so the next lookup of that exact string is a
//! single cache hit.

use async_trait::async_trait;
use civmap_common::config::GeocoderConfig;
use civmap_common::GeoPoint;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::address_cache::AddressCache;
use super::candidate_ladder::{CandidateLadder, LadderConfig};
use crate::error::IngestError;

/// Geographic box as `west, north, east, south` degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub south: f64,
}

impl BoundingBox {
    pub fn from_viewbox(viewbox: [f64; 4]) -> Self {
        Self {
            west: viewbox[0],
            north: viewbox[1],
            east: viewbox[2],
            south: viewbox[3],
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lng >= self.west.min(self.east)
            && point.lng <= self.west.max(self.east)
            && point.lat >= self.south.min(self.north)
            && point.lat <= self.south.max(self.north)
    }

    /// Provider `viewbox` parameter (`x1,y1,x2,y2`)
    pub fn to_query_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.north, self.east, self.south)
    }
}

/// Source of coordinates for a single query string
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Look up one query; `Ok(None)` when the provider has no match
    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, IngestError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Nominatim HTTP provider
pub struct NominatimProvider {
    http_client: reqwest::Client,
    base_url: String,
    accept_language: String,
    result_limit: u32,
    bbox: BoundingBox,
}

impl NominatimProvider {
    pub fn new(config: &GeocoderConfig) -> Result<Self, IngestError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::GeocodeProvider {
                query: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
            result_limit: config.result_limit.max(1),
            bbox: BoundingBox::from_viewbox(config.viewbox),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn search(&self, query: &str) -> Result<Option<GeoPoint>, IngestError> {
        let provider_error = |message: String| IngestError::GeocodeProvider {
            query: query.to_string(),
            message,
        };

        let url = format!("{}/search", self.base_url);
        let limit = self.result_limit.to_string();
        let viewbox = self.bbox.to_query_param();

        tracing::debug!(query = %query, url = %url, "Querying geocoding provider");

        let response = self
            .http_client
            .get(&url)
            .header("Accept-Language", self.accept_language.as_str())
            .query(&[
                ("format", "json"),
                ("q", query),
                ("viewbox", viewbox.as_str()),
                ("bounded", "1"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(provider_error(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        parse_search_response(&body, &self.bbox).map_err(provider_error)
    }
}

/// Parse a Nominatim JSON array into the first in-box point
///
/// Coordinates arrive as decimal strings. Results outside `bbox` are
/// discarded as out-of-region false positives.
pub fn parse_search_response(body: &str, bbox: &BoundingBox) -> Result<Option<GeoPoint>, String> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| format!("parse error: {}", e))?;

    for place in places {
        let (Ok(lat), Ok(lng)) = (place.lat.trim().parse::<f64>(), place.lon.trim().parse::<f64>())
        else {
            tracing::debug!(lat = %place.lat, lon = %place.lon, "Skipping unparseable coordinates");
            continue;
        };

        let point = GeoPoint::new(lat, lng);
        if bbox.contains(point) {
            return Ok(Some(point));
        }
        tracing::debug!(point = %point, "Ignoring out-of-region result");
    }

    Ok(None)
}

/// Rate limiter enforcing a minimum spacing between requests
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with rate limit
    pub(crate) async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Where a resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Provider,
}

/// Successful address resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub point: GeoPoint,
    /// Ladder rung that produced the hit
    pub matched_query: String,
    pub source: ResolutionSource,
}

/// Cached, rate-limited, ladder-driven geocoder
pub struct GeocodingClient {
    provider: Arc<dyn GeocodeProvider>,
    cache: Mutex<AddressCache>,
    rate_limiter: RateLimiter,
    ladder: LadderConfig,
}

impl GeocodingClient {
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        cache: AddressCache,
        min_interval: Duration,
        ladder: LadderConfig,
    ) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
            rate_limiter: RateLimiter::new(min_interval),
            ladder,
        }
    }

    /// Build the production client from configuration
    pub fn from_config(
        config: &GeocoderConfig,
        cache: AddressCache,
        ladder: LadderConfig,
    ) -> Result<Self, IngestError> {
        let provider = NominatimProvider::new(config)?;
        Ok(Self::new(
            Arc::new(provider),
            cache,
            Duration::from_millis(config.min_interval_ms),
            ladder,
        ))
    }

    /// Resolve an address to coordinates
    ///
    /// Returns `AddressUnresolved` only after every rung has missed both the
    /// cache and the provider. A provider error on one rung is logged and the
    /// next rung is tried.
    pub async fn resolve(&self, address: &str) -> Result<Resolution, IngestError> {
        let original = address.trim();
        let mut tried = 0;

        for candidate in CandidateLadder::new(original, &self.ladder) {
            tried += 1;

            let mut cache = self.cache.lock().await;
            if let Some(point) = cache.get(&candidate.query) {
                tracing::debug!(
                    address = %original,
                    query = %candidate.query,
                    step = candidate.step,
                    "Geocode cache hit"
                );
                if candidate.query != original {
                    if let Err(e) = cache.insert(original, point) {
                        tracing::error!(address = %original, error = %e, "Failed to persist geocode cache");
                    }
                }
                return Ok(Resolution {
                    point,
                    matched_query: candidate.query,
                    source: ResolutionSource::Cache,
                });
            }
            drop(cache);

            self.rate_limiter.wait().await;

            match self.provider.search(&candidate.query).await {
                Ok(Some(point)) => {
                    tracing::info!(
                        address = %original,
                        query = %candidate.query,
                        step = candidate.step,
                        point = %point,
                        provider = self.provider.name(),
                        "Geocoded address"
                    );

                    if let Err(e) = self.cache.lock().await.insert(original, point) {
                        tracing::error!(address = %original, error = %e, "Failed to persist geocode cache");
                    }

                    return Ok(Resolution {
                        point,
                        matched_query: candidate.query,
                        source: ResolutionSource::Provider,
                    });
                }
                Ok(None) => {
                    tracing::debug!(query = %candidate.query, step = candidate.step, "No match");
                }
                Err(e) => {
                    tracing::warn!(
                        query = %candidate.query,
                        step = candidate.step,
                        error = %e,
                        "Geocode candidate failed, trying next"
                    );
                }
            }
        }

        Err(IngestError::AddressUnresolved {
            address: original.to_string(),
            candidates: tried,
        })
    }

    /// Cached point for an exact address string
    #[cfg(test)]
    pub(crate) async fn cached(&self, address: &str) -> Option<GeoPoint> {
        self.cache.lock().await.get(address)
    }

    /// Number of cached addresses
    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}
