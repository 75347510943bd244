//! Event marker rendering.
//!
//! Every non-empty batch replaces the previous one outright: markers are
//! cleared, the overlay is moved to the new envelope and one marker per
//! event id is drawn in feed order with a staggered entrance.

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use crate::models::SeismicEvent;
use crate::projection::Projection;
use crate::scale::MagnitudeScale;
use crate::surface::{DrawingSurface, Entrance, Marker};

/// Delay between consecutive marker entrances.
pub const STAGGER: Duration = Duration::from_millis(200);

/// Time for a marker to grow to full size.
pub const GROW: Duration = Duration::from_millis(500);

/// Overlay padding as a multiple of the largest marker radius.
const PADDING_FACTOR: f64 = 1.10;

/// Result of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Nothing drawable; the previous batch is still on screen
    Unchanged,
    /// A new batch replaced the old one
    Rendered { markers: usize },
}

/// Ids currently on screen, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBatch {
    ids: Vec<String>,
}

impl RenderBatch {
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }
}

/// Owns the on-screen marker batch.
#[derive(Debug, Default)]
pub struct EventRenderer {
    batch: RenderBatch,
}

impl EventRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn batch(&self) -> &RenderBatch {
        &self.batch
    }

    /// Draw `events` on `surface`.
    ///
    /// Events without usable coordinates are skipped. If none remain the
    /// surface is left exactly as it was.
    pub fn render_events<S: DrawingSurface>(
        &mut self,
        events: &[SeismicEvent],
        scale: &MagnitudeScale,
        projection: &Projection,
        surface: &mut S,
    ) -> RenderOutcome {
        let drawable: Vec<&SeismicEvent> =
            events.iter().filter(|e| e.has_valid_coordinates()).collect();

        let Some(bounds) = projection.bounding_box(drawable.iter().copied()) else {
            debug!("no drawable events, keeping {} markers", self.batch.len());
            return RenderOutcome::Unchanged;
        };

        surface.clear_markers();
        self.batch.ids.clear();

        surface.set_geometry(bounds.expand(scale.max_radius() * PADDING_FACTOR));

        let mut seen = HashSet::with_capacity(drawable.len());
        for event in drawable {
            if !seen.insert(event.id.as_str()) {
                debug!("skipping duplicate event id {}", event.id);
                continue;
            }

            let order = u32::try_from(self.batch.ids.len()).unwrap_or(u32::MAX);
            surface.draw_marker(Marker {
                id: event.id.clone(),
                center: projection.project(event.longitude, event.latitude),
                radius: scale.radius(event.magnitude),
                color: scale.color(event.magnitude),
                entrance: Entrance {
                    delay: STAGGER.saturating_mul(order),
                    duration: GROW,
                },
                tooltip: tooltip(event),
                link: event.info_url.clone(),
            });
            self.batch.ids.push(event.id.clone());
        }

        debug!("rendered {} markers", self.batch.len());
        RenderOutcome::Rendered {
            markers: self.batch.len(),
        }
    }
}

fn tooltip(event: &SeismicEvent) -> String {
    format!(
        "Magnitude: {}\nDepth: {} km\n(click for info)",
        event.magnitude, event.depth_km
    )
}
