//! Hemmer Provider for Terraxcel
//!
//! This crate manages spreadsheet files through the Terraxcel API as
//! declarative infrastructure. It exposes three resources and one data
//! source over the Hemmer provider protocol:
//!
//! | Type                   | Kind        | Addressed by                          |
//! |------------------------|-------------|---------------------------------------|
//! | `terraxcel_workbook`   | resource    | `id`                                  |
//! | `terraxcel_sheet`      | resource    | `workbook_id`, `id`                   |
//! | `terraxcel_cell`       | resource    | `workbook_id`, `sheet_id`, `id`       |
//! | `terraxcel_extensions` | data source | (none)                                |
//!
//! # Overview
//!
//! - **Provider**: [`TerraxcelProvider`] resolves configuration once and
//!   dispatches requests to the resource adapters
//! - **Resources**: adapters translating declared state into API calls
//! - **Client**: the [`SpreadsheetApi`](client::SpreadsheetApi) seam and its
//!   HTTP implementation
//! - **Server helpers**: gRPC server with the handshake protocol
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Running
//!
//! ```ignore
//! use hemmer_provider_terraxcel::{init_logging, serve, TerraxcelProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(TerraxcelProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it outputs a handshake string to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! # Configuration
//!
//! ```text
//! provider "terraxcel" {
//!   host  = "http://localhost:8080"   # or TERRAXCEL_HOST
//!   token = "..."                     # or TERRAXCEL_TOKEN
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::TerraxcelProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
