//! # maillink-imap
//!
//! The IMAP side of a mail connection: just enough of RFC 9051 to open an
//! authenticated store, identify the client (RFC 2971) and log out again.
//!
//! ## Features
//!
//! - **Socket control**: bind to an explicit local address and pin the
//!   remote address while keeping the host name for TLS verification
//! - **TLS via rustls**: implicit TLS (port 993) and STARTTLS (port 143)
//! - **Connect-level errors**: socket connect failures are reported as
//!   [`Error::Connect`] so callers can tell them apart from login or
//!   protocol failures
//! - **Literal-aware framing** for server responses
//!
//! ## Quick Start
//!
//! ```ignore
//! use maillink_imap::{Config, ImapStore, Security};
//!
//! #[tokio::main]
//! async fn main() -> maillink_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .security(Security::Implicit)
//!         .build();
//!     let mut store = ImapStore::connect(&config, "user@example.com", "password").await?;
//!
//!     if store.has_capability("ID") {
//!         let server = store.id(&[("name", "maillink"), ("version", "0.0.2")]).await?;
//!         println!("{server:?}");
//!     }
//!
//!     store.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command serialization and tags
//! - [`response`]: response line parser
//! - [`connection`]: configuration, sockets, TLS and framing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod response;
mod store;

pub use command::{Command, TagGenerator};
pub use connection::{Config, ConfigBuilder, FramedStream, ImapStream, Security};
pub use error::{Error, Result};
pub use response::{Capabilities, Response, ResponseParser, Status, Untagged};
pub use store::ImapStore;

/// IMAP protocol version spoken by the store.
pub const IMAP_VERSION: &str = "IMAP4rev2";
