//! Hardline application layer.
//!
//! Loads configuration, initialises logging and wires the storage, remote,
//! sync and progress crates into one [`AppContext`].

pub mod config;
pub mod context;
pub mod logging;

pub use config::AppConfig;
pub use context::{AppContext, Backend, Services};
