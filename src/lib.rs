//! MDIPaint: a multi-canvas raster editor engine.
//!
//! Canvas windows own a [`canvas::PixelSurface`] each and are edited through
//! a [`ops::draw::DrawSession`]. Image transforms run through
//! [`plugins::TransformRunner`], either inline or as background jobs with
//! progress and cancellation.

pub mod canvas;
pub mod cli;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod plugins;
pub mod settings;
pub mod workspace;
