//! # maillink-smtp
//!
//! The SMTP side of a mail connection (RFC 5321): open a transport,
//! announce the local host name, secure it and authenticate.
//!
//! ## Features
//!
//! - **Socket control**: bind to an explicit local address and pin the
//!   remote address while keeping the host name for TLS verification
//! - **TLS support**: implicit TLS (port 465) and STARTTLS (port 587)
//! - **Authentication**: PLAIN and LOGIN
//! - **Connect-level errors**: socket connect failures are reported as
//!   [`Error::Connect`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use maillink_smtp::{Config, Security, SmtpTransport};
//!
//! #[tokio::main]
//! async fn main() -> maillink_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .local_hostname("[192.0.2.10]")
//!         .build();
//!     let transport = SmtpTransport::connect(&config, "user@example.com", "password").await?;
//!     println!("connected to {}", transport.server_info().hostname);
//!     transport.quit().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod reply;
mod transport;

pub use command::{AuthMechanism, Command};
pub use connection::{Config, ConfigBuilder, Security, SmtpStream};
pub use error::{Error, Result};
pub use reply::{Reply, ReplyCode};
pub use transport::{ServerInfo, SmtpTransport};

/// SMTP protocol version supported.
pub const SMTP_VERSION: &str = "SMTP/ESMTP (RFC 5321)";
