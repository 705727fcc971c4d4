//! Auto-connect - Reuses a user's login credentials against external servers.
//!
//! # Architecture
//!
//! ```text
//!        Login success
//!             ↓
//! ┌─────────────────────────────────────────┐
//! │       AutoConnectManager                 │
//! │  - snapshot user context                 │
//! │  - submit batch to bounded executor      │
//! └─────────────────────────────────────────┘
//!             ↓
//! ┌─────────────────────────────────────────┐
//! │       Batch (background)                 │
//! │  - servers from ServerDirectory          │
//! │  - connector per server from registry    │
//! │  - check credentials, collect successes  │
//! └─────────────────────────────────────────┘
//!             ↓
//!   Session live credentials (merge, existing wins)
//! ```
//!
//! # Core Types
//!
//! - [`AutoConnectManager`] - login listener running the batches
//! - [`ConnectorRegistry`] - connector factories by server kind
//! - [`ServerDirectory`] - servers reachable by a user
//! - [`TaskExecutor`] - where batches run

pub mod connectors;
pub mod directory;
pub mod events;
pub mod executor;
pub mod manager;
pub mod registry;

pub use directory::{ExternalServer, ServerDirectory, StaticServerDirectory};
pub use events::{LoginEvents, LoginListener, LoginSuccessEvent};
pub use executor::{BoundedExecutor, TaskExecutor};
pub use manager::{connect_all, publish, AutoConnectManager, ConnectReport};
pub use registry::{ConnectorFactory, ConnectorRegistry};
