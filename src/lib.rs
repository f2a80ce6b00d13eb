//! distroforge library.
//!
//! The binary is a thin clap layer over these modules; integration tests in
//! `tests/` drive them directly with fake collaborators.

pub mod config;
pub mod dl;
pub mod error;
pub mod graph;
pub mod image;
pub mod pipeline;
pub mod policy;
pub mod preflight;
pub mod process;
pub mod render;
pub mod timing;

pub use error::{Error, Result};
