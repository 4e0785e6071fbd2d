//! # depot-api: Command Layer for Depot
//!
//! Async commands over the inventory ledger and transfer engine. Each
//! command takes a [`DepotState`] and a camelCase request DTO and returns
//! an [`ApiResponse`].
//!
//! ## Module Organization
//! ```text
//! depot_api/
//! ├── lib.rs          ◄─── You are here (exports)
//! ├── state.rs        ◄─── Database handle + engine settings
//! ├── config.rs       ◄─── Defaults → depot.toml → DEPOT_* env
//! ├── logging.rs      ◄─── tracing-subscriber setup
//! ├── error.rs        ◄─── ApiError, ErrorCode, ApiResponse envelope
//! └── commands/
//!     ├── movement.rs ◄─── Ledger queries and manual movements
//!     ├── stock.rs    ◄─── Registry, reservations, aggregates
//!     └── transfer.rs ◄─── Transfer lifecycle
//! ```
//!
//! ## Startup
//! ```rust,ignore
//! depot_api::init_tracing();
//! let config = DepotConfig::load(None)?;
//! let state = DepotState::open(&config).await?;
//!
//! let response = commands::transfer::get_transfer(&state, id).await;
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;

pub use config::{ConfigError, DepotConfig};
pub use error::{ApiError, ApiResponse, ErrorCode};
pub use logging::init_tracing;
pub use state::DepotState;
