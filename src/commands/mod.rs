//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Build, tag and push images
//! - `order` - Print the build order
//! - `dl` - Collect and archive distroless file sets
//! - `preflight` - Run preflight checks
//! - `show` - Display information

pub mod build;
pub mod dl;
mod order;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use dl::cmd_dl;
pub use order::cmd_order;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
