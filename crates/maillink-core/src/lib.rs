//! # maillink-core
//!
//! Opens IMAP stores and SMTP transports for a mail client, and keeps
//! trying when the first connect fails on a multi-homed host.
//!
//! When a host resolves to several addresses (dual-stack IPv4/IPv6, or a
//! device on both Wi-Fi and a VPN), the default route may not reach all of
//! them. After a socket level failure the [`ConnectionEstablisher`] pairs
//! every remote address with every same-family address of every up,
//! non-loopback interface and retries bound to each local address in turn.
//!
//! This crate provides:
//! - [`ConnectionEstablisher`]: configuration, connect with fallback, close
//! - [`SessionProperties`]: typed session settings per service family
//! - [`NetworkStack`]: resolution and interface enumeration ([`SystemNetwork`])
//! - [`MailProvider`]: store and transport opening ([`NetworkProvider`])
//! - [`Diagnostics`]: log lines and breadcrumbs ([`TracingDiagnostics`])
//! - Account and identity records loadable from JSON

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod candidates;
pub mod diagnostics;
mod error;
mod establisher;
pub mod network;
pub mod properties;
pub mod protocol;
pub mod provider;

pub use account::{Account, AppIdentity, ConnectionTarget, Identity, ServerEndpoint};
pub use candidates::{Candidate, candidates};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use error::{Error, Result};
pub use establisher::{ActiveConnection, ConnectionEstablisher};
pub use network::{AddressFamily, LocalInterface, NetworkStack, SystemNetwork, address_literal};
pub use properties::{FamilySettings, SessionProperties, TransportSettings};
pub use protocol::{Protocol, ServiceFamily};
pub use provider::{MailProvider, MailStore, MailTransport, NetworkProvider, Session};
