//! Named map views.

use chrono::{DateTime, TimeZone, Utc};

use crate::controller::ViewConfig;
use crate::geo::LatLng;

/// A ready-made view: where to look and which days to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    WestCoastNow,
    WestCoastWeek,
    Valdivia1960,
    GreatAlaska1964,
    Sumatra2004,
    DenaliFault2002,
}

impl Preset {
    pub const ALL: [Self; 6] = [
        Self::WestCoastNow,
        Self::WestCoastWeek,
        Self::Valdivia1960,
        Self::GreatAlaska1964,
        Self::Sumatra2004,
        Self::DenaliFault2002,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WestCoastNow => "west-coast-now",
            Self::WestCoastWeek => "west-coast-week",
            Self::Valdivia1960 => "valdivia-1960",
            Self::GreatAlaska1964 => "great-alaska-1964",
            Self::Sumatra2004 => "sumatra-2004",
            Self::DenaliFault2002 => "denali-fault-2002",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WestCoastNow => "Earthquakes in the last 24 hours",
            Self::WestCoastWeek => "Earthquakes in the past week",
            Self::Valdivia1960 => "1960 Chilean Earthquake",
            Self::GreatAlaska1964 => "1964 Great Alaska Earthquake",
            Self::Sumatra2004 => "2004 Sumatra/Indian Ocean Earthquake",
            Self::DenaliFault2002 => "2002 Denali Fault Earthquake",
        }
    }

    /// Center, zoom, days and window end (local end of day, read as UTC).
    const fn params(self) -> (LatLng, u8, i64, Option<(i32, u32, u32)>) {
        match self {
            Self::WestCoastNow => (LatLng::new(41.991_341, -115.782_354), 5, 1, None),
            Self::WestCoastWeek => (LatLng::new(41.991_341, -115.782_354), 5, 7, None),
            Self::Valdivia1960 => (LatLng::new(-39.827_338, -73.247_785), 6, 4, Some((1960, 5, 25))),
            Self::GreatAlaska1964 => {
                (LatLng::new(59.385_651, -147.024_957), 5, 4, Some((1964, 3, 28)))
            }
            Self::Sumatra2004 => (LatLng::new(7.655_104, 94.012_632), 6, 3, Some((2004, 12, 28))),
            Self::DenaliFault2002 => {
                (LatLng::new(62.006_110, -146.780_242), 6, 4, Some((2002, 11, 6)))
            }
        }
    }

    /// Last second of the preset's final day, or `None` for "now".
    #[must_use]
    pub fn end_date(self) -> Option<DateTime<Utc>> {
        let (_, _, _, end) = self.params();
        let (y, m, d) = end?;
        Utc.with_ymd_and_hms(y, m, d, 23, 59, 59).single()
    }

    /// The view this preset describes; the event type is left at its default.
    #[must_use]
    pub fn view(self) -> ViewConfig {
        let (center, zoom, window_days, _) = self.params();
        ViewConfig {
            center,
            zoom,
            end_date: self.end_date(),
            window_days,
            ..ViewConfig::default()
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown preset: {s} (expected one of: {})", names.join(", "))
            })
    }
}
