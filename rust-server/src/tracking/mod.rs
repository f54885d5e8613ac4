//! Per-message engagement instrumentation for outgoing HTML bodies.

pub mod pixel;
pub mod rewrite;

pub use pixel::TRANSPARENT_PIXEL_PNG;
pub use rewrite::{build_tracking_pixel, instrument_body, rewrite_links};
