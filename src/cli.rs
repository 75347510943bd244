//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use quakemap::controller::{Command as ViewCommand, ViewConfig, ViewOptions};
use quakemap::geo::{LatLng, Point};
use quakemap::output::Format;
use quakemap::presets::Preset;
use quakemap::query::{FDSN_QUERY_URL, parse_timestamp};

/// Magnitude-scaled earthquake maps from the USGS event feed.
#[derive(Parser, Debug)]
#[command(name = "quakemap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch once and write the map as SVG
    Render(RenderArgs),

    /// Print the feed URL or the events it returns
    Query(QueryArgs),

    /// Keep a map file up to date while reading view changes from stdin
    Watch(WatchArgs),
}

/// What to show, shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Start from a named view (west-coast-now, denali-fault-2002, ...)
    #[arg(long, value_parser = parse_preset)]
    pub preset: Option<Preset>,

    /// Map center: lat,lon
    #[arg(long, allow_hyphen_values = true, value_parser = parse_center)]
    pub center: Option<LatLng>,

    /// Zoom level (3-11)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Number of days to show, ending at --end
    #[arg(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Last instant to show (YYYY-MM-DD or ISO8601, defaults to now)
    #[arg(long, value_parser = parse_end)]
    pub end: Option<DateTime<Utc>>,

    /// FDSN event type
    #[arg(long)]
    pub event_type: Option<String>,

    /// Map width in pixels
    #[arg(long, default_value = "960", value_parser = parse_dimension)]
    pub width: f64,

    /// Map height in pixels
    #[arg(long, default_value = "600", value_parser = parse_dimension)]
    pub height: f64,

    /// Event query endpoint
    #[arg(long, default_value = FDSN_QUERY_URL)]
    pub feed_url: String,

    /// Render every response, even ones superseded by a newer request
    #[arg(long)]
    pub keep_stale: bool,
}

impl ViewArgs {
    /// Controller options: preset first, then explicit flags on top.
    #[must_use]
    pub fn to_options(&self) -> ViewOptions {
        let mut view = self.preset.map_or_else(ViewConfig::default, Preset::view);

        if let Some(center) = self.center {
            view.center = center;
        }
        if let Some(zoom) = self.zoom {
            view.zoom = zoom;
        }
        if let Some(days) = self.days {
            view.window_days = days;
        }
        if self.end.is_some() {
            view.end_date = self.end;
        }
        if let Some(event_type) = &self.event_type {
            view.event_type.clone_from(event_type);
        }

        ViewOptions {
            view,
            size: Point::new(self.width, self.height),
            feed_url: self.feed_url.clone(),
            discard_stale: !self.keep_stale,
            ..ViewOptions::default()
        }
    }

    /// Map title, from the preset when one was given.
    #[must_use]
    pub fn title(&self) -> String {
        self.preset
            .map_or_else(|| "Earthquakes".to_string(), |p| p.label().to_string())
    }
}

/// Arguments for the `render` command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Write the SVG here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the `query` command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,

    /// Print the request URL without fetching
    #[arg(long)]
    pub url_only: bool,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// SVG file rewritten after every render
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

/// One line of `watch` input.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchLine {
    Command(ViewCommand),
    Quit,
}

/// Parse a `watch` input line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns a message describing the expected syntax.
pub fn parse_watch_line(line: &str) -> Result<Option<WatchLine>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match (verb.as_str(), args.as_slice()) {
        ("center", [at]) => ViewCommand::SetCenter(parse_center(at)?),
        ("zoom", [level]) => {
            let zoom = level
                .parse()
                .map_err(|_| format!("invalid zoom level: {level}"))?;
            ViewCommand::SetZoom(zoom)
        }
        ("window", [end, days]) => {
            let end = if end.eq_ignore_ascii_case("now") {
                None
            } else {
                Some(parse_end(end)?)
            };
            let days = days
                .parse()
                .map_err(|_| format!("invalid day count: {days}"))?;
            ViewCommand::SetWindow { end, days }
        }
        ("type", [name]) => ViewCommand::SetEventType((*name).to_string()),
        ("pan", [offset]) => ViewCommand::PanBy(offset.parse()?),
        ("refresh", []) => ViewCommand::Refresh,
        ("quit" | "exit", []) => return Ok(Some(WatchLine::Quit)),
        _ => {
            return Err(format!(
                "unrecognized command: {line} (expected: center LAT,LON | zoom N | \
                 window END|now DAYS | type NAME | pan DX,DY | refresh | quit)"
            ));
        }
    };
    Ok(Some(WatchLine::Command(command)))
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a preset name from string.
fn parse_preset(s: &str) -> Result<Preset, String> {
    s.parse()
}

/// Parse a map center from string.
fn parse_center(s: &str) -> Result<LatLng, String> {
    s.parse()
}

/// Parse a map dimension: a finite, positive pixel count.
fn parse_dimension(s: &str) -> Result<f64, String> {
    let px: f64 = s.parse().map_err(|e| format!("invalid pixel size '{s}': {e}"))?;
    if px.is_finite() && px > 0.0 {
        Ok(px)
    } else {
        Err(format!("pixel size must be positive, got {s}"))
    }
}

/// Parse an end timestamp from string.
fn parse_end(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}
