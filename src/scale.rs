//! Magnitude to marker color/radius mapping.
//!
//! A scale is a fixed list of breakpoints; values between breakpoints are
//! linearly interpolated and values outside the domain clamp to the ends.

use crate::errors::QuakeMapError;

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` form.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channel-wise interpolation, `t` in [0, 1].
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn channel(a: u8, b: u8, t: f64) -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        }
        Self {
            r: channel(self.r, other.r, t),
            g: channel(self.g, other.g, t),
            b: channel(self.b, other.b, t),
        }
    }
}

impl std::str::FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb, got '{s}'"));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color '{s}': {e}"))
        };
        Ok(Self::new(byte(0)?, byte(2)?, byte(4)?))
    }
}

/// One stop of a magnitude scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub magnitude: f64,
    pub color: Rgb,
    pub radius: f64,
}

// ColorBrewer OrRd, 9 classes
const USGS_STOPS: [(f64, Rgb, f64); 9] = [
    (-1.0, Rgb::new(0xff, 0xf7, 0xec), 1.0),
    (0.0, Rgb::new(0xfe, 0xe8, 0xc8), 1.0),
    (1.0, Rgb::new(0xfd, 0xd4, 0x9e), 1.5),
    (2.0, Rgb::new(0xfd, 0xbb, 0x84), 3.0),
    (3.0, Rgb::new(0xfc, 0x8d, 0x59), 4.5),
    (4.0, Rgb::new(0xef, 0x65, 0x48), 6.0),
    (5.0, Rgb::new(0xd7, 0x30, 0x1f), 7.5),
    (6.0, Rgb::new(0xb3, 0x00, 0x00), 9.0),
    (9.0, Rgb::new(0x7f, 0x00, 0x00), 13.5),
];

/// Piecewise-linear magnitude scale.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeScale {
    breakpoints: Vec<Breakpoint>,
}

impl MagnitudeScale {
    /// Create a scale from breakpoints.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless there are at least two breakpoints,
    /// magnitudes are finite and strictly increasing, and radii are finite,
    /// non-negative and non-decreasing.
    pub fn new(breakpoints: Vec<Breakpoint>) -> Result<Self, QuakeMapError> {
        if breakpoints.len() < 2 {
            return Err(QuakeMapError::InvalidParameter(
                "a magnitude scale needs at least two breakpoints".into(),
            ));
        }
        if let Some(bad) = breakpoints
            .iter()
            .find(|b| !b.magnitude.is_finite() || !b.radius.is_finite() || b.radius < 0.0)
        {
            return Err(QuakeMapError::InvalidParameter(format!(
                "breakpoint at magnitude {} has an invalid value",
                bad.magnitude
            )));
        }
        for pair in breakpoints.windows(2) {
            if pair[1].magnitude <= pair[0].magnitude {
                return Err(QuakeMapError::InvalidParameter(format!(
                    "breakpoint magnitudes must strictly increase ({} then {})",
                    pair[0].magnitude, pair[1].magnitude
                )));
            }
            if pair[1].radius < pair[0].radius {
                return Err(QuakeMapError::InvalidParameter(format!(
                    "breakpoint radii must not decrease ({} then {})",
                    pair[0].radius, pair[1].radius
                )));
            }
        }
        Ok(Self { breakpoints })
    }

    /// The scale used on USGS-style maps: M-1 to M9.
    #[must_use]
    pub fn usgs() -> Self {
        Self {
            breakpoints: USGS_STOPS
                .iter()
                .map(|&(magnitude, color, radius)| Breakpoint {
                    magnitude,
                    color,
                    radius,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Largest marker radius this scale can produce.
    #[must_use]
    pub fn max_radius(&self) -> f64 {
        self.breakpoints
            .iter()
            .map(|b| b.radius)
            .fold(0.0, f64::max)
    }

    /// Marker radius in pixels for a magnitude.
    #[must_use]
    pub fn radius(&self, magnitude: f64) -> f64 {
        let (lo, hi, t) = self.segment(magnitude);
        lo.radius + (hi.radius - lo.radius) * t
    }

    /// Marker fill color for a magnitude.
    #[must_use]
    pub fn color(&self, magnitude: f64) -> Rgb {
        let (lo, hi, t) = self.segment(magnitude);
        lo.color.lerp(hi.color, t)
    }

    /// Bracketing breakpoints and the position between them.
    fn segment(&self, magnitude: f64) -> (&Breakpoint, &Breakpoint, f64) {
        let first = &self.breakpoints[0];
        let last = &self.breakpoints[self.breakpoints.len() - 1];

        // NaN lands on the low end
        if magnitude.is_nan() || magnitude <= first.magnitude {
            return (first, first, 0.0);
        }
        if magnitude >= last.magnitude {
            return (last, last, 0.0);
        }

        let hi_idx = self
            .breakpoints
            .iter()
            .position(|b| b.magnitude >= magnitude)
            .unwrap_or(self.breakpoints.len() - 1);
        let lo = &self.breakpoints[hi_idx - 1];
        let hi = &self.breakpoints[hi_idx];
        let t = (magnitude - lo.magnitude) / (hi.magnitude - lo.magnitude);
        (lo, hi, t)
    }
}

impl Default for MagnitudeScale {
    fn default() -> Self {
        Self::usgs()
    }
}
