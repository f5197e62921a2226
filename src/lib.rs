//! Embeddable customer-guidance widget.
//!
//! The crate has three layers: the host-page [`loader`] that mounts the
//! iframe and talks to it over `postMessage`, the in-iframe state container
//! ([`store`], driven through [`session`]) with its mock question/solution
//! backend ([`mock`]), and an Axum [`server`] that serves the loader script,
//! the iframe page and a JSON API over widget sessions.

pub mod api;
pub mod assets;
pub mod config;
pub mod loader;
pub mod mock;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use loader::page::{HostPage, InMemoryPage};
pub use loader::{EmbedLoader, LoaderConfig, LoaderError, LoaderOptions, init_guidance_widget};
pub use mock::{DatasetKind, Latency, MockBackend, MockDataset, WidgetBackend};
pub use protocol::{HostMessage, ProtocolError, WidgetMessage};
pub use session::{SessionRegistry, WidgetSession};
pub use store::{WidgetSnapshot, WidgetStore};
pub use types::*;
