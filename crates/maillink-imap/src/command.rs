//! IMAP commands and tags.
//!
//! Only the commands needed to open and identify a store are modelled.

use crate::{Error, Result};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0000", "A0001", etc.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.counter);
        self.counter = self.counter.wrapping_add(1);
        tag
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// An IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY
    Capability,
    /// STARTTLS
    StartTls,
    /// LOGIN user password
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// ID (RFC 2971). `None` sends `ID NIL`.
    Id(Option<Vec<(String, String)>>),
    /// LOGOUT
    Logout,
}

impl Command {
    /// Serializes the command with the given tag, CRLF terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument cannot be sent as a quoted string.
    pub fn serialize(&self, tag: &str) -> Result<Vec<u8>> {
        let mut line = format!("{tag} ");
        match self {
            Self::Capability => line.push_str("CAPABILITY"),
            Self::StartTls => line.push_str("STARTTLS"),
            Self::Login { username, password } => {
                line.push_str("LOGIN ");
                line.push_str(&quote(username)?);
                line.push(' ');
                line.push_str(&quote(password)?);
            }
            Self::Id(None) => line.push_str("ID NIL"),
            Self::Id(Some(params)) => {
                line.push_str("ID (");
                let mut fields = Vec::with_capacity(params.len() * 2);
                for (key, value) in params {
                    fields.push(quote(key)?);
                    fields.push(quote(value)?);
                }
                line.push_str(&fields.join(" "));
                line.push(')');
            }
            Self::Logout => line.push_str("LOGOUT"),
        }
        line.push_str("\r\n");
        Ok(line.into_bytes())
    }

    /// Returns a loggable rendering with credentials removed.
    #[must_use]
    pub fn redacted(&self, tag: &str) -> String {
        match self {
            Self::Login { username, .. } => format!("{tag} LOGIN {username} <password>"),
            other => other
                .serialize(tag)
                .map(|bytes| String::from_utf8_lossy(&bytes).trim_end().to_string())
                .unwrap_or_else(|_| format!("{tag} <unprintable>")),
        }
    }
}

/// Renders a quoted string, escaping `"` and `\`.
fn quote(value: &str) -> Result<String> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(Error::Protocol(
            "CR, LF and NUL cannot be sent in a quoted string".into(),
        ));
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Ok(quoted)
}
