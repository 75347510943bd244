//! Data models for USGS FDSN event query responses.
//!
//! These structures match the GeoJSON format returned by
//! `fdsnws/event/1/query?format=geojson`. Fields the map never reads are
//! left out; serde ignores them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::QuakeMapError;

/// Top-level GeoJSON response from the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection"
    #[serde(rename = "type")]
    pub type_: String,

    /// Feed metadata (absent in hand-built collections)
    #[serde(default)]
    pub metadata: Option<Metadata>,

    /// Earthquake events
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// An empty collection, used for FDSN "no data" responses.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            type_: "FeatureCollection".into(),
            metadata: None,
            features: Vec::new(),
        }
    }

    /// Validate the response structure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the top-level type is wrong.
    pub fn validate(&self) -> Result<(), QuakeMapError> {
        if self.type_ != "FeatureCollection" {
            return Err(QuakeMapError::InvalidResponse(format!(
                "expected type 'FeatureCollection', got '{}'",
                self.type_
            )));
        }
        Ok(())
    }

    /// Convert every usable feature to a [`SeismicEvent`], keeping feed order.
    ///
    /// Features without geometry are dropped.
    #[must_use]
    pub fn events(&self) -> Vec<SeismicEvent> {
        let events: Vec<SeismicEvent> = self
            .features
            .iter()
            .filter_map(SeismicEvent::from_feature)
            .collect();

        let dropped = self.features.len() - events.len();
        if dropped > 0 {
            tracing::debug!("dropped {} features without geometry", dropped);
        }
        events
    }
}

/// Metadata about the feed response.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    /// When this response was generated (ms since epoch)
    pub generated: i64,

    /// Request URL
    pub url: String,

    /// Human-readable title
    pub title: String,

    /// HTTP status code
    pub status: u16,

    /// API version string
    pub api: String,

    /// Number of events in response
    pub count: usize,
}

/// A single feed feature.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Unique event ID
    pub id: String,

    /// Geographic location; the feed occasionally sends `null`
    pub geometry: Option<Geometry>,

    /// Event properties
    #[serde(default)]
    pub properties: Properties,
}

/// Geographic geometry for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Coordinates: [longitude, latitude, depth_km]
    pub coordinates: Vec<f64>,
}

/// Event properties used by the map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    /// Magnitude value
    pub mag: Option<f64>,

    /// Magnitude type (mb, Ml, Mw, etc.)
    #[serde(rename = "magType")]
    pub mag_type: Option<String>,

    /// Human-readable place description
    pub place: Option<String>,

    /// Event time (ms since epoch)
    pub time: Option<i64>,

    /// Event page URL
    pub url: Option<String>,

    /// Event type (earthquake, quarry blast, etc.)
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

/// A feed event reduced to what the map draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeismicEvent {
    pub id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub info_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

impl SeismicEvent {
    /// Build an event from a feature, or `None` when it has no usable geometry.
    ///
    /// Missing magnitude and depth read as 0.
    #[must_use]
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let coords = &feature.geometry.as_ref()?.coordinates;
        let (&longitude, &latitude) = (coords.first()?, coords.get(1)?);

        Some(Self {
            id: feature.id.clone(),
            longitude,
            latitude,
            depth_km: coords.get(2).copied().unwrap_or(0.0),
            magnitude: feature.properties.mag.unwrap_or(0.0),
            info_url: feature.properties.url.clone().unwrap_or_default(),
            time: feature
                .properties
                .time
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            place: feature.properties.place.clone(),
        })
    }

    /// Whether the coordinates can be projected.
    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
    }
}
