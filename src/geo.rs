//! Geo-attribute lookup: address → zoning/historic attributes.
//!
//! A thin pipeline over two public services: the OpenStreetMap Nominatim
//! geocoder (address → point) and the DC Office of Zoning ArcGIS map
//! service (point → per-layer feature attributes). Layer failures degrade
//! to missing attributes; only a geocode miss is a hard `NotFound`.

use crate::errors::{HarvestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default Nominatim endpoint.
pub const NOMINATIM_BASE: &str = "https://nominatim.openstreetmap.org";

/// Default DC zoning map service endpoint.
pub const ARCGIS_BASE: &str =
    "https://maps2.dcgis.dc.gov/dcgis/rest/services/DCOZ/Zone_Mapservice/MapServer";

/// Zone-district layer (general category).
pub const LAYER_ZONE_DISTRICT: u32 = 21;
/// Zoning-label layer (specific code).
pub const LAYER_ZONING_LABEL: u32 = 22;
/// Historic-district layer.
pub const LAYER_HISTORIC_DISTRICT: u32 = 6;

/// Merged attributes for a looked-up address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub zone_district: Option<String>,
    pub zoning_label: Option<String>,
    pub historic_district: Option<String>,
}

/// Address → coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve an address to `(lat, lon)`, or `None` when the geocoder
    /// has no match.
    async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>>;
}

#[derive(Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

#[derive(Deserialize)]
struct FeatureSet {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

/// HTTP client for the geocoder and the ArcGIS layers.
#[derive(Clone)]
pub struct GeoClient {
    client: reqwest::Client,
    nominatim_base: String,
    arcgis_base: String,
}

impl GeoClient {
    /// Client against the production endpoints.
    pub fn new() -> Self {
        Self::with_endpoints(NOMINATIM_BASE, ARCGIS_BASE)
    }

    /// Client against explicit endpoints (tests point this at a stub).
    pub fn with_endpoints(nominatim_base: &str, arcgis_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Zoning-Analysis-Bot")
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            client,
            nominatim_base: nominatim_base.trim_end_matches('/').to_string(),
            arcgis_base: arcgis_base.trim_end_matches('/').to_string(),
        }
    }

    /// Query a single map layer for the attribute value at a point.
    ///
    /// Point-intersect query in WGS84; geometry travels as an esri JSON
    /// literal. A response with no features yields `None`.
    pub async fn query_layer(
        &self,
        layer_id: u32,
        lat: f64,
        lon: f64,
        out_field: &str,
    ) -> Result<Option<String>> {
        let geometry = serde_json::json!({
            "x": lon,
            "y": lat,
            "spatialReference": { "wkid": 4326 },
        })
        .to_string();
        let url = format!("{}/{layer_id}/query", self.arcgis_base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("f", "json"),
                ("geometry", geometry.as_str()),
                ("geometryType", "esriGeometryPoint"),
                ("inSR", "4326"),
                ("spatialRel", "esriSpatialRelIntersects"),
                ("returnGeometry", "false"),
                ("outFields", out_field),
            ])
            .send()
            .await
            .map_err(|e| HarvestError::Http(format!("layer {layer_id}: {e}")))?;

        if !response.status().is_success() {
            return Err(HarvestError::Http(format!(
                "layer {layer_id}: HTTP {}",
                response.status()
            )));
        }

        let set: FeatureSet = response
            .json()
            .await
            .map_err(|e| HarvestError::Http(format!("layer {layer_id}: bad body: {e}")))?;

        Ok(set
            .features
            .iter()
            .find_map(|f| f.attributes.get(out_field))
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    /// Resolve an address to its full attribute set.
    ///
    /// Returns `Ok(None)` when the address cannot be geocoded. Individual
    /// layer failures are logged and leave that attribute unset.
    pub async fn lookup(&self, address: &str) -> Result<Option<AttributeSet>> {
        let Some((lat, lon)) = self.geocode(address).await? else {
            return Ok(None);
        };
        debug!(lat, lon, "geocoded");

        let attrs = AttributeSet {
            zone_district: self
                .layer_or_none(LAYER_ZONE_DISTRICT, lat, lon, "District")
                .await,
            zoning_label: self
                .layer_or_none(LAYER_ZONING_LABEL, lat, lon, "Zoning_Label")
                .await,
            historic_district: self
                .layer_or_none(LAYER_HISTORIC_DISTRICT, lat, lon, "HistDistrict_NAME")
                .await,
        };
        Ok(Some(attrs))
    }

    /// Layer query with failure demoted to a missing attribute.
    async fn layer_or_none(&self, layer: u32, lat: f64, lon: f64, field: &str) -> Option<String> {
        match self.query_layer(layer, lat, lon, field).await {
            Ok(value) => value,
            Err(e) => {
                warn!(layer, error = %e, "layer query failed");
                None
            }
        }
    }
}

impl Default for GeoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for GeoClient {
    async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>> {
        let url = format!("{}/search", self.nominatim_base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(|e| HarvestError::Http(format!("geocode: {e}")))?;

        if !response.status().is_success() {
            return Err(HarvestError::Http(format!(
                "geocode: HTTP {}",
                response.status()
            )));
        }

        let hits: Vec<NominatimHit> = response
            .json()
            .await
            .map_err(|e| HarvestError::Http(format!("geocode: bad body: {e}")))?;

        match hits.first() {
            Some(hit) => {
                let lat = hit.lat.parse().map_err(|_| {
                    HarvestError::Http(format!("geocode: bad latitude '{}'", hit.lat))
                })?;
                let lon = hit.lon.parse().map_err(|_| {
                    HarvestError::Http(format!("geocode: bad longitude '{}'", hit.lon))
                })?;
                Ok(Some((lat, lon)))
            }
            None => Ok(None),
        }
    }
}
