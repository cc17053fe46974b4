//! Mail protocols and the service family each one selects.

use std::fmt;

/// Kind of service a protocol opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceFamily {
    /// Message store (IMAP).
    Store,
    /// Message transport (SMTP).
    Transport,
}

impl ServiceFamily {
    /// Returns the display name of the service kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Transport => "transport",
        }
    }
}

/// Mail protocol an establisher is configured for.
///
/// Unknown names are kept rather than rejected; connecting with one fails
/// with [`Error::UnsupportedProvider`](crate::Error::UnsupportedProvider).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// IMAP with STARTTLS.
    Imap,
    /// IMAP over implicit TLS.
    Imaps,
    /// SMTP with STARTTLS.
    Smtp,
    /// SMTP over implicit TLS.
    Smtps,
    /// Any other protocol name.
    Other(String),
}

impl Protocol {
    /// Parses a protocol name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "imap" => Self::Imap,
            "imaps" => Self::Imaps,
            "smtp" => Self::Smtp,
            "smtps" => Self::Smtps,
            _ => Self::Other(name.to_string()),
        }
    }

    /// Returns the protocol name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Imap => "imap",
            Self::Imaps => "imaps",
            Self::Smtp => "smtp",
            Self::Smtps => "smtps",
            Self::Other(name) => name,
        }
    }

    /// Returns the service family, or `None` for unsupported protocols.
    #[must_use]
    pub const fn family(&self) -> Option<ServiceFamily> {
        match self {
            Self::Imap | Self::Imaps => Some(ServiceFamily::Store),
            Self::Smtp | Self::Smtps => Some(ServiceFamily::Transport),
            Self::Other(_) => None,
        }
    }

    /// Returns true if TLS starts immediately on connect.
    #[must_use]
    pub const fn is_implicit_tls(&self) -> bool {
        matches!(self, Self::Imaps | Self::Smtps)
    }
}

impl From<&str> for Protocol {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
