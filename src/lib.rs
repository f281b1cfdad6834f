//! # Mockup Rendering Service
//!
//! Warps a flat design image onto a quadrilateral region of a photo (a shirt
//! front, a mug, a poster frame) and composites it back with adjustable
//! opacity, optional background keying of the design, and shading that
//! follows the surface texture of the photo.
//!
//! The pipeline lives in plain synchronous modules ([`codec`], [`keying`],
//! [`warp`], [`shading`], [`composite`], [`pipeline`]); [`routes`] puts an
//! Axum HTTP surface in front of it and [`store`] persists the results.

pub mod codec;
pub mod composite;
pub mod config;
pub mod error;
pub mod geometry;
pub mod keying;
pub mod pipeline;
pub mod raster;
pub mod routes;
pub mod shading;
pub mod store;
pub mod warp;

pub use error::{DecodeError, RenderError, StoreError};
pub use pipeline::{render, RenderConfig};
