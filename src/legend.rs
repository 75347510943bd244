//! Magnitude legend.
//!
//! One node per scale breakpoint, left to right, each a circle drawn with
//! the breakpoint's radius and color under an `M<magnitude>` label.

use crate::geo::{Point, PixelBounds};
use crate::scale::MagnitudeScale;
use crate::surface::{DrawingSurface, Legend, LegendEntry};

/// Width reserved per breakpoint, px.
const NODE_SIZE: f64 = 40.0;
const PADDING: f64 = 5.0;
/// Label sits this far above the circle center.
const LABEL_OFFSET: f64 = 15.0;

/// Lays out and draws the legend for a scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegendRenderer;

impl LegendRenderer {
    /// Height of the legend layer; used to anchor it to a bottom edge.
    #[must_use]
    pub fn layer_height() -> f64 {
        frame_height() + 6.0 * PADDING
    }

    /// Compute the legend without drawing it.
    #[must_use]
    pub fn layout(scale: &MagnitudeScale, anchor: Point) -> Legend {
        let stops = scale.breakpoints();
        #[allow(clippy::cast_precision_loss)]
        let frame_width = stops.len() as f64 * (NODE_SIZE + 1.0);
        let frame_height = frame_height();
        let circle_y = frame_height - NODE_SIZE / 2.0 + PADDING;

        let entries = stops
            .iter()
            .enumerate()
            .map(|(i, stop)| {
                #[allow(clippy::cast_precision_loss)]
                let x = PADDING + (2.0 * NODE_SIZE / 3.0 + NODE_SIZE * i as f64);
                LegendEntry {
                    center: Point::new(x, circle_y),
                    radius: stop.radius,
                    color: stop.color,
                    label: format!("M{}", stop.magnitude),
                    label_at: Point::new(x, circle_y - LABEL_OFFSET),
                }
            })
            .collect();

        Legend {
            anchor,
            width: frame_width + 2.0 * PADDING,
            height: Self::layer_height(),
            frame: PixelBounds {
                top_left: Point::new(PADDING, 2.0 * PADDING),
                bottom_right: Point::new(PADDING + frame_width, 2.0 * PADDING + frame_height),
            },
            entries,
        }
    }

    /// Replace any legend on the surface with a fresh one at `anchor`.
    pub fn render<S: DrawingSurface>(&self, surface: &mut S, scale: &MagnitudeScale, anchor: Point) {
        surface.remove_legend();
        surface.draw_legend(Self::layout(scale, anchor));
    }
}

fn frame_height() -> f64 {
    NODE_SIZE * 1.5
}
