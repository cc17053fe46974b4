//! IMAP response parser.
//!
//! Parses the handful of responses the store cares about: status lines
//! (tagged and untagged, with an optional `[CAPABILITY ...]` code),
//! `CAPABILITY` and `ID`. Everything else is kept as text.

use crate::{Error, Result};

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Capabilities advertised by a server.
///
/// Names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    /// Parses a space-separated capability list.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self(
            list.split_ascii_whitespace()
                .map(str::to_ascii_uppercase)
                .collect(),
        )
    }

    /// Returns true if the capability is advertised.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|cap| cap.eq_ignore_ascii_case(name))
    }

    /// Iterates over the advertised capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion of a command.
    Tagged {
        /// The command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Capabilities from a `[CAPABILITY ...]` response code.
        capabilities: Option<Capabilities>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data.
    Untagged(Untagged),
    /// Command continuation request (`+ ...`).
    Continuation(String),
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Untagged {
    /// `* OK`, `* NO`, `* BAD`, `* PREAUTH` or `* BYE`.
    Status {
        /// Status word.
        status: Status,
        /// Capabilities from a `[CAPABILITY ...]` response code.
        capabilities: Option<Capabilities>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Capabilities),
    /// `* ID (...)` or `* ID NIL`.
    Id(Option<Vec<(String, String)>>),
    /// Anything the store does not interpret.
    Other(String),
}

/// Stateless response parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response as returned by
    /// [`FramedStream::read_response`](crate::FramedStream::read_response).
    ///
    /// # Errors
    ///
    /// Returns an error if the response is malformed.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let input = input.strip_suffix(b"\r\n").unwrap_or(input);

        if let Some(rest) = input.strip_prefix(b"+") {
            return Ok(Response::Continuation(lossy(rest).trim().to_string()));
        }

        if let Some(rest) = input.strip_prefix(b"* ") {
            return parse_untagged(rest).map(Response::Untagged);
        }

        let line = lossy(input);
        let mut parts = line.splitn(3, ' ');
        let tag = parts.next().unwrap_or_default();
        let status = parts
            .next()
            .and_then(Status::parse)
            .ok_or_else(|| Error::Protocol(format!("unexpected response: {line}")))?;
        if tag.is_empty() {
            return Err(Error::Protocol("empty tag".into()));
        }
        let (capabilities, text) = split_code(parts.next().unwrap_or_default());

        Ok(Response::Tagged {
            tag: tag.to_string(),
            status,
            capabilities,
            text,
        })
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_untagged(rest: &[u8]) -> Result<Untagged> {
    let keyword_end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    let keyword = lossy(&rest[..keyword_end]);
    let args = rest.get(keyword_end + 1..).unwrap_or_default();

    if let Some(status) = Status::parse(&keyword) {
        let (capabilities, text) = split_code(&lossy(args));
        return Ok(Untagged::Status {
            status,
            capabilities,
            text,
        });
    }

    match keyword.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Ok(Untagged::Capability(Capabilities::parse(&lossy(args)))),
        "ID" => parse_id(args).map(Untagged::Id),
        _ => Ok(Untagged::Other(lossy(rest))),
    }
}

/// Splits `[CODE ...] text` into an optional capability list and the text.
fn split_code(rest: &str) -> (Option<Capabilities>, String) {
    let Some(inner) = rest.strip_prefix('[') else {
        return (None, rest.to_string());
    };
    let Some(close) = inner.find(']') else {
        return (None, rest.to_string());
    };

    let code = &inner[..close];
    let text = inner[close + 1..].trim_start().to_string();
    let capabilities = code
        .split_once(' ')
        .filter(|(name, _)| name.eq_ignore_ascii_case("CAPABILITY"))
        .map(|(_, list)| Capabilities::parse(list));
    (capabilities, text)
}

/// A token inside an `ID` parameter list.
enum Token {
    Open,
    Close,
    Nil,
    Text(String),
}

struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Tokenizer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        while self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        let Some(&byte) = self.input.get(self.pos) else {
            return Ok(None);
        };

        match byte {
            b'(' => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            b')' => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            b'"' => self.quoted().map(Some),
            b'{' => self.literal().map(Some),
            _ => {
                let start = self.pos;
                while let Some(&b) = self.input.get(self.pos) {
                    if b == b' ' || b == b')' || b == b'(' {
                        break;
                    }
                    self.pos += 1;
                }
                let atom = lossy(&self.input[start..self.pos]);
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(Some(Token::Nil))
                } else {
                    Ok(Some(Token::Text(atom)))
                }
            }
        }
    }

    fn quoted(&mut self) -> Result<Token> {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            let Some(&b) = self.input.get(self.pos) else {
                return Err(Error::Protocol("unterminated quoted string".into()));
            };
            self.pos += 1;
            match b {
                b'"' => return Ok(Token::Text(lossy(&value))),
                b'\\' => {
                    let escaped = self
                        .input
                        .get(self.pos)
                        .ok_or_else(|| Error::Protocol("dangling escape".into()))?;
                    value.push(*escaped);
                    self.pos += 1;
                }
                _ => value.push(b),
            }
        }
    }

    fn literal(&mut self) -> Result<Token> {
        let rest = &self.input[self.pos..];
        let header_end = rest
            .windows(3)
            .position(|w| w == b"}\r\n")
            .ok_or_else(|| Error::Protocol("malformed literal".into()))?;
        let digits = lossy(&rest[1..header_end]);
        let len: usize = digits
            .trim_end_matches('+')
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid literal length: {digits}")))?;

        let start = self.pos + header_end + 3;
        let data = self
            .input
            .get(start..start + len)
            .ok_or_else(|| Error::Protocol("truncated literal".into()))?;
        self.pos = start + len;
        Ok(Token::Text(lossy(data)))
    }
}

fn parse_id(args: &[u8]) -> Result<Option<Vec<(String, String)>>> {
    let mut tokens = Tokenizer {
        input: args,
        pos: 0,
    };

    match tokens.next_token()? {
        Some(Token::Nil) => return Ok(None),
        Some(Token::Open) => {}
        _ => return Err(Error::Protocol("ID response must be NIL or a list".into())),
    }

    let mut params = Vec::new();
    loop {
        let key = match tokens.next_token()? {
            Some(Token::Close) => return Ok(Some(params)),
            Some(Token::Text(key)) => key,
            _ => return Err(Error::Protocol("malformed ID parameter list".into())),
        };
        match tokens.next_token()? {
            Some(Token::Text(value)) => params.push((key, value)),
            Some(Token::Nil) => {}
            _ => return Err(Error::Protocol(format!("ID field {key} has no value"))),
        }
    }
}
