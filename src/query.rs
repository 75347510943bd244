//! Feed query construction.
//!
//! Builds FDSN event query URLs from a time window, a viewport rectangle
//! and an event type. See <https://earthquake.usgs.gov/fdsnws/event/1/>.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};

use reqwest::Url;

use crate::errors::QuakeMapError;
use crate::geo::GeoBounds;

/// USGS FDSN event query endpoint.
pub const FDSN_QUERY_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Widest longitude range the feed accepts in one request.
pub const MAX_LONGITUDE_SPAN: f64 = 360.0;

/// Seconds in one day of the query window.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Resolved start/end of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Everything needed to ask the feed for one map view.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Last instant of the window; `None` means now
    pub end: Option<DateTime<Utc>>,
    /// Window length in days, counted back from `end`
    pub window_days: i64,
    /// Visible rectangle
    pub bounds: Option<GeoBounds>,
    /// FDSN event type, e.g. "earthquake"
    pub event_type: String,
}

impl FeedQuery {
    /// Resolve the time window against `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the window is not positive.
    pub fn window_at(&self, now: DateTime<Utc>) -> Result<TimeWindow, QuakeMapError> {
        if self.window_days <= 0 {
            return Err(QuakeMapError::InvalidParameter(format!(
                "window must be at least one day, got {}",
                self.window_days
            )));
        }

        let span = self
            .window_days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                QuakeMapError::InvalidParameter(format!(
                    "window of {} days is too large",
                    self.window_days
                ))
            })?;

        let end = self.end.unwrap_or(now);
        let start = end.checked_sub_signed(span).ok_or_else(|| {
            QuakeMapError::InvalidParameter(format!(
                "window of {} days reaches before the representable range",
                self.window_days
            ))
        })?;

        Ok(TimeWindow { start, end })
    }

    /// Build the request URL, resolving an open end date to the current time.
    ///
    /// # Errors
    ///
    /// See [`FeedQuery::build_at`].
    pub fn build(&self, base_url: &str) -> Result<String, QuakeMapError> {
        self.build_at(base_url, Utc::now())
    }

    /// Build the request URL with an explicit notion of "now".
    ///
    /// Results are always requested in ascending time order so markers can
    /// be animated chronologically.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a non-positive window, missing or
    /// unusable bounds, or a base URL that does not parse.
    pub fn build_at(&self, base_url: &str, now: DateTime<Utc>) -> Result<String, QuakeMapError> {
        let window = self.window_at(now)?;
        let bounds = self.bounds.ok_or_else(|| {
            QuakeMapError::InvalidParameter("viewport bounds are required".into())
        })?;
        let bounds = usable_bounds(bounds)?;

        let mut url = Url::parse(base_url).map_err(|e| {
            QuakeMapError::InvalidParameter(format!("invalid feed url '{base_url}': {e}"))
        })?;

        // timestamps and numbers need no escaping and stay readable
        let fixed = [
            ("format", "geojson".to_string()),
            ("starttime", format_time(window.start)),
            ("endtime", format_time(window.end)),
            ("minlatitude", bounds.min_lat.to_string()),
            ("maxlatitude", bounds.max_lat.to_string()),
            ("minlongitude", bounds.min_lon.to_string()),
            ("maxlongitude", bounds.max_lon.to_string()),
        ]
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{fixed}"),
            _ => fixed,
        };
        url.set_query(Some(&query));
        url.query_pairs_mut()
            .append_pair("eventtype", &self.event_type)
            .append_pair("orderby", "time-asc");

        Ok(url.into())
    }
}

/// Normalize bounds, rejecting ones the feed cannot answer: non-finite
/// edges or a longitude span wider than the globe.
fn usable_bounds(raw: GeoBounds) -> Result<GeoBounds, QuakeMapError> {
    // checked before normalizing; min/max would swallow a NaN edge
    let edges = [raw.min_lat, raw.max_lat, raw.min_lon, raw.max_lon];
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(QuakeMapError::InvalidParameter(format!(
            "viewport bounds are not finite: {raw:?}"
        )));
    }

    // re-normalize; the fields are public
    let bounds = GeoBounds::from_edges(raw.min_lat, raw.max_lat, raw.min_lon, raw.max_lon);
    let span = bounds.max_lon - bounds.min_lon;
    if span > MAX_LONGITUDE_SPAN {
        return Err(QuakeMapError::InvalidParameter(format!(
            "longitude span {span} exceeds {MAX_LONGITUDE_SPAN} degrees"
        )));
    }
    Ok(bounds)
}

/// ISO-8601 UTC with second precision, e.g. `2002-11-06T23:59:59Z`.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a user-supplied timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` (read as UTC) and `YYYY-MM-DD`
/// (midnight UTC).
///
/// # Errors
///
/// Returns `InvalidParameter` if none of the formats match.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, QuakeMapError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(QuakeMapError::InvalidParameter(format!(
        "unrecognized date '{s}' (expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(days: i64) -> FeedQuery {
        FeedQuery {
            end: Some(parse_timestamp("2002-11-06T23:59:59Z").unwrap()),
            window_days: days,
            bounds: Some(GeoBounds::from_edges(40.0, 55.0, -130.0, -115.0)),
            event_type: "earthquake".into(),
        }
    }

    #[test]
    fn test_window_is_exact_days() {
        let now = Utc::now();
        for days in [1, 2, 7, 30, 365] {
            let w = query(days).window_at(now).unwrap();
            assert_eq!((w.end - w.start).num_seconds(), days * SECONDS_PER_DAY);
            assert!(w.start < w.end);
        }
    }

    #[test]
    fn test_open_end_uses_now() {
        let now = parse_timestamp("2024-01-02T03:04:05Z").unwrap();
        let mut q = query(1);
        q.end = None;
        let w = q.window_at(now).unwrap();
        assert_eq!(w.end, now);
        assert_eq!(format_time(w.start), "2024-01-01T03:04:05Z");
    }

    #[test]
    fn test_build_url() {
        let url = query(1).build(FDSN_QUERY_URL).unwrap();
        assert_eq!(
            url,
            "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson\
             &starttime=2002-11-05T23:59:59Z&endtime=2002-11-06T23:59:59Z\
             &minlatitude=40&maxlatitude=55&minlongitude=-130&maxlongitude=-115\
             &eventtype=earthquake&orderby=time-asc"
        );
    }

    #[test]
    fn test_swapped_bounds_normalized() {
        let mut q = query(1);
        q.bounds = Some(GeoBounds {
            min_lat: 55.0,
            max_lat: 40.0,
            min_lon: -115.0,
            max_lon: -130.0,
        });
        let url = q.build(FDSN_QUERY_URL).unwrap();
        assert!(url.contains("minlatitude=40&maxlatitude=55"));
        assert!(url.contains("minlongitude=-130&maxlongitude=-115"));
    }

    #[test]
    fn test_non_positive_window_rejected() {
        for days in [0, -1, -30] {
            let err = query(days).build(FDSN_QUERY_URL).unwrap_err();
            assert!(matches!(err, QuakeMapError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_missing_bounds_rejected() {
        let mut q = query(1);
        q.bounds = None;
        assert!(matches!(
            q.build(FDSN_QUERY_URL),
            Err(QuakeMapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_event_type_encoded() {
        let mut q = query(1);
        q.event_type = "quarry blast".into();
        let url = q.build(FDSN_QUERY_URL).unwrap();
        assert!(url.contains("eventtype=quarry+blast&"));

        q.event_type = "a&orderby=b".into();
        let url = q.build(FDSN_QUERY_URL).unwrap();
        assert!(url.ends_with("&eventtype=a%26orderby%3Db&orderby=time-asc"));
    }

    #[test]
    fn test_non_finite_bounds_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut q = query(1);
            q.bounds = Some(GeoBounds {
                min_lat: 40.0,
                max_lat: 55.0,
                min_lon: bad,
                max_lon: -115.0,
            });
            assert!(matches!(
                q.build(FDSN_QUERY_URL),
                Err(QuakeMapError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_longitude_span_over_globe_rejected() {
        let mut q = query(1);
        q.bounds = Some(GeoBounds::from_edges(-60.0, 60.0, -200.0, 170.0));
        assert!(matches!(
            q.build(FDSN_QUERY_URL),
            Err(QuakeMapError::InvalidParameter(_))
        ));

        q.bounds = Some(GeoBounds::from_edges(-60.0, 60.0, -180.0, 180.0));
        assert!(q.build(FDSN_QUERY_URL).is_ok());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        assert!(matches!(
            query(1).build("not a url"),
            Err(QuakeMapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_existing_query_string_extended() {
        let url = query(1)
            .build("http://localhost:9000/query?nodata=404")
            .unwrap();
        assert!(url.starts_with("http://localhost:9000/query?nodata=404&format=geojson&"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("1964-03-28T23:59:59").unwrap();
        let b = parse_timestamp("1964-03-28T23:59:59Z").unwrap();
        let c = parse_timestamp("1964-03-28T15:59:59-08:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(
            format_time(parse_timestamp("2004-12-28").unwrap()),
            "2004-12-28T00:00:00Z"
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
