//! Host map viewport and the projection derived from it.
//!
//! The viewport is Web Mercator with 256 px tiles, the same model slippy
//! map libraries use. A [`Projection`] is a snapshot of one viewport state;
//! after any pan or zoom take a fresh one from [`Viewport::projection`].

use std::f64::consts::PI;

use crate::geo::{GeoBounds, LatLng, Point, PixelBounds};
use crate::models::SeismicEvent;
use crate::query::MAX_LONGITUDE_SPAN;

/// Tile edge in pixels at zoom 0.
const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Mercator square.
const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Zoom limits of the host map. At the default size a zoomed-out view would
/// span more than the globe; [`Viewport::bounds`] caps wider views.
pub const MIN_ZOOM: u8 = 3;
pub const MAX_ZOOM: u8 = 11;

/// Visible map area: center, zoom and size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center: LatLng,
    zoom: u8,
    size: Point,
}

impl Viewport {
    /// Create a viewport; zoom is clamped to [`MIN_ZOOM`]..=[`MAX_ZOOM`].
    #[must_use]
    pub fn new(center: LatLng, zoom: u8, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            size,
        }
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        self.center
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    #[must_use]
    pub fn size(&self) -> Point {
        self.size
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.center = center;
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn resize(&mut self, size: Point) {
        self.size = size;
    }

    /// Shift the view by a pixel offset, as a drag gesture would.
    /// A non-finite offset is ignored.
    pub fn pan_by(&mut self, offset: Point) {
        if !(offset.x.is_finite() && offset.y.is_finite()) {
            return;
        }
        let projection = self.projection();
        let target = Point::new(
            self.size.x / 2.0 + offset.x,
            self.size.y / 2.0 + offset.y,
        );
        let mut center = projection.unproject(target);
        center.lon = wrap_lon(center.lon);
        self.center = center;
    }

    /// Projection for the current state.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let scale = TILE_SIZE * 2_f64.powi(i32::from(self.zoom));
        let center = world_point(self.center.lon, self.center.lat, scale);
        Projection {
            scale,
            origin: Point::new(center.x - self.size.x / 2.0, center.y - self.size.y / 2.0),
        }
    }

    /// Geographic rectangle currently visible.
    ///
    /// A view wider than the globe is capped to one turn of longitude
    /// around the center, the widest range the feed accepts.
    #[must_use]
    pub fn bounds(&self) -> GeoBounds {
        let projection = self.projection();
        let north_west = projection.unproject(Point::new(0.0, 0.0));
        let south_east = projection.unproject(self.size);

        let (mut west, mut east) = (north_west.lon, south_east.lon);
        if east - west > MAX_LONGITUDE_SPAN {
            west = self.center.lon - MAX_LONGITUDE_SPAN / 2.0;
            east = self.center.lon + MAX_LONGITUDE_SPAN / 2.0;
        }
        GeoBounds::from_edges(south_east.lat, north_west.lat, west, east)
    }
}

/// Geographic to pixel transform for one viewport state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    scale: f64,
    origin: Point,
}

impl Projection {
    /// Project a coordinate into surface pixels (origin at the viewport's
    /// top-left corner).
    #[must_use]
    pub fn project(&self, lon: f64, lat: f64) -> Point {
        let world = world_point(lon, lat, self.scale);
        Point::new(world.x - self.origin.x, world.y - self.origin.y)
    }

    /// Inverse of [`Projection::project`].
    #[must_use]
    pub fn unproject(&self, point: Point) -> LatLng {
        let x = (point.x + self.origin.x) / self.scale;
        let y = (point.y + self.origin.y) / self.scale;
        let lon = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
        LatLng::new(lat, lon)
    }

    /// Pixel envelope of a set of events; `None` if none can be projected.
    pub fn bounding_box<'a>(
        &self,
        events: impl IntoIterator<Item = &'a SeismicEvent>,
    ) -> Option<PixelBounds> {
        PixelBounds::enclosing(
            events
                .into_iter()
                .filter(|e| e.has_valid_coordinates())
                .map(|e| self.project(e.longitude, e.latitude)),
        )
    }
}

/// Mercator world pixel for a coordinate at the given world size.
fn world_point(lon: f64, lat: f64, scale: f64) -> Point {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lon + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    Point::new(x, y)
}

fn wrap_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 { 180.0 } else { wrapped }
}
