//! Vector drawing surface.
//!
//! The renderers talk to a [`DrawingSurface`]; [`SvgSurface`] is the
//! implementation used by the binary. It lays out an overlay positioned at
//! the marker envelope (markers are translated into it) and a separate
//! legend layer, then serializes the whole thing as a standalone SVG
//! document with SMIL entrance animations.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::QuakeMapError;
use crate::geo::{Point, PixelBounds};
use crate::scale::Rgb;

/// Radius animation applied when a marker appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entrance {
    /// Wait before growing
    pub delay: Duration,
    /// Time to grow from 0 to full radius
    pub duration: Duration,
}

/// One event marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Event id, unique within a batch
    pub id: String,
    /// Position in viewport pixels
    pub center: Point,
    pub radius: f64,
    pub color: Rgb,
    pub entrance: Entrance,
    /// Hover text
    pub tooltip: String,
    /// Opened on activation
    pub link: String,
}

/// A laid-out magnitude key.
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    /// Top-left corner of the legend layer in viewport pixels
    pub anchor: Point,
    pub width: f64,
    pub height: f64,
    /// Framing box, relative to the anchor
    pub frame: PixelBounds,
    pub entries: Vec<LegendEntry>,
}

/// One swatch of the legend, positions relative to the legend anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub center: Point,
    pub radius: f64,
    pub color: Rgb,
    pub label: String,
    pub label_at: Point,
}

/// Operations the renderers need from a vector surface.
pub trait DrawingSurface {
    /// Match the host viewport size.
    fn resize(&mut self, size: Point);

    /// Remove every event marker.
    fn clear_markers(&mut self);

    /// Position the marker overlay.
    fn set_geometry(&mut self, bounds: PixelBounds);

    /// Current overlay position, if it has been placed.
    fn geometry(&self) -> Option<PixelBounds>;

    fn draw_marker(&mut self, marker: Marker);

    fn markers(&self) -> &[Marker];

    /// Add a legend layer. Layers stack; callers remove old ones first.
    fn draw_legend(&mut self, legend: Legend);

    fn remove_legend(&mut self);

    fn legends(&self) -> &[Legend];

    /// Publish the current frame.
    ///
    /// # Errors
    ///
    /// Implementations that write somewhere return the write error.
    fn present(&mut self) -> Result<(), QuakeMapError> {
        Ok(())
    }
}

/// In-memory SVG surface, optionally written to a file on every present.
#[derive(Debug, Clone, Default)]
pub struct SvgSurface {
    size: Point,
    geometry: Option<PixelBounds>,
    markers: Vec<Marker>,
    legends: Vec<Legend>,
    title: Option<String>,
    output: Option<PathBuf>,
}

impl SvgSurface {
    #[must_use]
    pub fn new(size: Point) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Write the document to `path` each time the surface is presented.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Caption shown in the document's `<title>`.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Serialize the current frame.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_svg(&mut out);
        out
    }

    fn write_svg(&self, out: &mut String) -> std::fmt::Result {
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="0 0 {} {}">"#,
            num(self.size.x),
            num(self.size.y),
            num(self.size.x),
            num(self.size.y)
        )?;
        if let Some(title) = &self.title {
            writeln!(out, "  <title>{}</title>", escape(title))?;
        }
        writeln!(
            out,
            r##"  <rect class="basemap" width="100%" height="100%" fill="#dfe9f2"/>"##
        )?;

        if let Some(geometry) = self.geometry {
            let (left, top) = (geometry.top_left.x, geometry.top_left.y);
            writeln!(
                out,
                r#"  <svg class="overlay" x="{}" y="{}" width="{}" height="{}" overflow="visible">"#,
                num(left),
                num(top),
                num(geometry.width()),
                num(geometry.height())
            )?;
            writeln!(out, r#"    <g transform="translate({},{})">"#, num(-left), num(-top))?;
            for marker in &self.markers {
                write_marker(out, marker)?;
            }
            writeln!(out, "    </g>")?;
            writeln!(out, "  </svg>")?;
        }

        for legend in &self.legends {
            write_legend(out, legend)?;
        }

        writeln!(out, "</svg>")
    }
}

impl DrawingSurface for SvgSurface {
    fn resize(&mut self, size: Point) {
        self.size = size;
    }

    fn clear_markers(&mut self) {
        self.markers.clear();
    }

    fn set_geometry(&mut self, bounds: PixelBounds) {
        self.geometry = Some(bounds);
    }

    fn geometry(&self) -> Option<PixelBounds> {
        self.geometry
    }

    fn draw_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn markers(&self) -> &[Marker] {
        &self.markers
    }

    fn draw_legend(&mut self, legend: Legend) {
        self.legends.push(legend);
    }

    fn remove_legend(&mut self) {
        self.legends.clear();
    }

    fn legends(&self) -> &[Legend] {
        &self.legends
    }

    /// Writes the document synchronously. The file is a few kilobytes per
    /// hundred markers and is written once per rendered batch, so the
    /// controller task blocks only briefly; surfaces with slow sinks should
    /// hand the frame to a blocking task instead.
    fn present(&mut self) -> Result<(), QuakeMapError> {
        if let Some(path) = &self.output {
            std::fs::write(path, self.to_svg())?;
            tracing::debug!("wrote map to {}", path.display());
        }
        Ok(())
    }
}

fn write_marker(out: &mut String, marker: &Marker) -> std::fmt::Result {
    writeln!(
        out,
        r#"      <a class="earthquake-link" xlink:href="{}" href="{}" target="_blank">"#,
        escape(&marker.link),
        escape(&marker.link)
    )?;
    writeln!(
        out,
        r#"        <circle id="{}" class="earthquake" cx="{}" cy="{}" r="0" fill="{}">"#,
        escape(&marker.id),
        num(marker.center.x),
        num(marker.center.y),
        marker.color.to_hex()
    )?;
    writeln!(out, "          <title>{}</title>", escape(&marker.tooltip))?;
    writeln!(
        out,
        r#"          <animate attributeName="r" from="0" to="{}" begin="{}ms" dur="{}ms" fill="freeze"/>"#,
        num(marker.radius),
        marker.entrance.delay.as_millis(),
        marker.entrance.duration.as_millis()
    )?;
    writeln!(out, "        </circle>")?;
    writeln!(out, "      </a>")
}

fn write_legend(out: &mut String, legend: &Legend) -> std::fmt::Result {
    writeln!(
        out,
        r#"  <svg class="legend" x="{}" y="{}" width="{}" height="{}">"#,
        num(legend.anchor.x),
        num(legend.anchor.y),
        num(legend.width),
        num(legend.height)
    )?;
    writeln!(
        out,
        r##"    <rect class="legend-box" x="{}" y="{}" width="{}" height="{}" fill="#ffffff" fill-opacity="0.8" stroke="#999999"/>"##,
        num(legend.frame.top_left.x),
        num(legend.frame.top_left.y),
        num(legend.frame.width()),
        num(legend.frame.height())
    )?;
    for entry in &legend.entries {
        writeln!(
            out,
            r#"    <circle class="earthquake" cx="{}" cy="{}" r="{}" fill="{}"/>"#,
            num(entry.center.x),
            num(entry.center.y),
            num(entry.radius),
            entry.color.to_hex()
        )?;
        writeln!(
            out,
            r#"    <text class="legend-mag-text" x="{}" y="{}" text-anchor="middle" font-size="11">{}</text>"#,
            num(entry.label_at.x),
            num(entry.label_at.y),
            escape(&entry.label)
        )?;
    }
    writeln!(out, "  </svg>")
}

/// Two decimals, trailing zeros trimmed.
fn num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: &str) -> Marker {
        Marker {
            id: id.into(),
            center: Point::new(120.0, 80.5),
            radius: 6.0,
            color: Rgb::new(0xef, 0x65, 0x48),
            entrance: Entrance {
                delay: Duration::from_millis(400),
                duration: Duration::from_millis(500),
            },
            tooltip: "Magnitude: 4\nDepth: 10 km".into(),
            link: "https://example.org/event?id=1&format=html".into(),
        }
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(12.0), "12");
        assert_eq!(num(12.5), "12.5");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(7.12345), "7.12");
    }

    #[test]
    fn test_svg_contains_markers() {
        let mut surface = SvgSurface::new(Point::new(400.0, 300.0));
        surface.set_geometry(PixelBounds {
            top_left: Point::new(100.0, 50.0),
            bottom_right: Point::new(200.0, 150.0),
        });
        surface.draw_marker(marker("ak1"));

        let svg = surface.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"translate(-100,-50)"#));
        assert!(svg.contains(r#"id="ak1""#));
        assert!(svg.contains(r#"to="6" begin="400ms" dur="500ms""#));
        assert!(svg.contains("event?id=1&amp;format=html"));
        assert!(svg.contains(r##"fill="#ef6548""##));
    }

    #[test]
    fn test_no_overlay_until_positioned() {
        let mut surface = SvgSurface::new(Point::new(400.0, 300.0));
        surface.draw_marker(marker("ak1"));
        assert!(!surface.to_svg().contains("overlay"));
    }

    #[test]
    fn test_present_writes_file() {
        let path = std::env::temp_dir().join(format!("quakemap-test-{}.svg", std::process::id()));
        let mut surface = SvgSurface::new(Point::new(10.0, 10.0)).with_output(&path);
        surface.set_title("Denali <2002>");
        surface.present().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<title>Denali &lt;2002&gt;</title>"));
        let _ = std::fs::remove_file(&path);
    }
}
