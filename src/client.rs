//! USGS FDSN event feed client.
//!
//! Provides async HTTP access to the event query endpoint.
//! Uses reqwest with rustls for TLS.

use std::future::Future;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::errors::QuakeMapError;
use crate::models::FeatureCollection;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakemap/", env!("CARGO_PKG_VERSION"));

/// Something that answers feed query URLs with GeoJSON.
///
/// The controller only depends on this, so tests can substitute a canned
/// feed for the network.
pub trait EventFeed: Send + Sync + 'static {
    /// Fetch and decode the collection at `url`.
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FeatureCollection, QuakeMapError>> + Send;
}

/// Client for the USGS event query API.
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// Create a new feed client.
    ///
    /// No request timeout is set; a slow feed simply delays the render.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, QuakeMapError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl EventFeed for FeedClient {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FeatureCollection, QuakeMapError> {
        debug!("fetching feed");

        let response = self.client.get(url).send().await?;

        // FDSN answers "no events" with 204 and an empty body
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("feed returned no content");
            return Ok(FeatureCollection::empty());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuakeMapError::Api {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let feed: FeatureCollection = response.json().await?;

        // Validate response structure
        feed.validate()?;

        debug!("fetched {} features", feed.features.len());
        Ok(feed)
    }
}
