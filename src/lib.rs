//! Magnitude-scaled earthquake maps from the USGS event feed.
//!
//! A [`controller::ViewController`] turns a map view into FDSN query URLs,
//! fetches the matching events and draws them as color and size coded
//! markers, with a magnitude legend, on a [`surface::DrawingSurface`].

pub mod client;
pub mod controller;
pub mod debounce;
pub mod errors;
pub mod geo;
pub mod legend;
pub mod models;
pub mod output;
pub mod presets;
pub mod projection;
pub mod query;
pub mod render;
pub mod scale;
pub mod surface;
