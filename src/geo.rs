//! Geographic and pixel-space primitives.

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::str::FromStr for LatLng {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "center requires 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in center: {e}"))?;

        let center = Self::new(vals[0], vals[1]);

        if !(-90.0..=90.0).contains(&center.lat) {
            return Err(format!("latitude {} out of range [-90, 90]", center.lat));
        }
        if !(-180.0..=180.0).contains(&center.lon) {
            return Err(format!("longitude {} out of range [-180, 180]", center.lon));
        }

        Ok(center)
    }
}

/// A point in drawing-surface pixel space (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::str::FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected x,y but got '{s}'"))?;
        let x: f64 = x.trim().parse().map_err(|e| format!("invalid x: {e}"))?;
        let y: f64 = y.trim().parse().map_err(|e| format!("invalid y: {e}"))?;
        if !(x.is_finite() && y.is_finite()) {
            return Err(format!("expected finite x,y but got '{s}'"));
        }
        Ok(Self::new(x, y))
    }
}

/// Geographic rectangle, always stored with min <= max on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Build bounds from the four edges a host map reports.
    ///
    /// Edges may arrive swapped (south above north, or west/east flipped
    /// near the antimeridian); they are reordered here.
    #[must_use]
    pub fn from_edges(south: f64, north: f64, west: f64, east: f64) -> Self {
        Self {
            min_lat: south.min(north),
            max_lat: south.max(north),
            min_lon: west.min(east),
            max_lon: west.max(east),
        }
    }

    /// Check if a point is within the bounds.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Pixel-space envelope described by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl PixelBounds {
    /// Smallest envelope containing every point, or `None` for no points.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self {
                    top_left: p,
                    bottom_right: p,
                },
                Some(b) => Self {
                    top_left: Point::new(b.top_left.x.min(p.x), b.top_left.y.min(p.y)),
                    bottom_right: Point::new(b.bottom_right.x.max(p.x), b.bottom_right.y.max(p.y)),
                },
            })
        })
    }

    /// Grow the envelope by `padding` pixels on every side.
    #[must_use]
    pub fn expand(self, padding: f64) -> Self {
        Self {
            top_left: Point::new(self.top_left.x - padding, self.top_left.y - padding),
            bottom_right: Point::new(self.bottom_right.x + padding, self.bottom_right.y + padding),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }
}
