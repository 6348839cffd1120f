//! CA Lobby Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the CA Lobby workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LobbyError`] and the [`Result`] alias
//! - **Logging**: console/file/JSON `tracing` setup driven by `LOG_*` variables
//!
//! # Example
//!
//! ```no_run
//! use lobby_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> lobby_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{LobbyError, Result};
