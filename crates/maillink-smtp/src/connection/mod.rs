//! SMTP connection management: configuration, sockets and TLS.

mod config;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use stream::{SmtpStream, connect};
