//! Application shell for the studio booking core.
//!
//! - [`config`]: settings from the environment
//! - [`app`]: storage backend selection and service wiring
//! - [`walkthrough`]: the scripted tour the `studio` binary runs

pub mod app;
pub mod config;
pub mod walkthrough;

pub use app::App;
pub use config::Config;
