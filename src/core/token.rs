//! Purpose: Convert between external handle tokens and internal registry keys.
//! Exports: `Token`, `TokenCodec`, `DEFAULT_NAMESPACE`.
//! Role: The only place token text is produced or parsed.
//! Invariants: Tokens are strictly positive; `0`, negatives, and non-digits never decode.
//! Invariants: Decode failures are `ErrorKind::Token` and never panic.
use std::fmt;
use std::num::NonZeroU64;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_NAMESPACE: &str = "::augeas";

const SEPARATOR: &str = "::";
const ERROR_PARSE: &str = "cannot parse token";

/// Internal registry key; the counter value a token was issued with.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Token(NonZeroU64);

impl Token {
    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenCodec {
    namespace: String,
}

impl TokenCodec {
    /// Build a codec for `namespace` (e.g. `::augeas`).
    pub fn new(namespace: impl Into<String>) -> Result<Self, Error> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("namespace must not be empty"));
        }
        if namespace.ends_with(SEPARATOR) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("namespace must not end with `::`")
                .with_detail(namespace));
        }
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn encode(&self, token: Token) -> String {
        format!("{}{SEPARATOR}{token}", self.namespace)
    }

    /// Accepts `<namespace>::<n>` or bare `<n>`, where `n` matches `[1-9][0-9]*`.
    pub fn decode(&self, raw: &str) -> Result<Token, Error> {
        let body = raw
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .unwrap_or(raw);

        let well_formed = body.starts_with(|c: char| matches!(c, '1'..='9'))
            && body.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(Error::new(ErrorKind::Token)
                .with_message(ERROR_PARSE)
                .with_detail(raw));
        }

        let value = body.parse::<u64>().map_err(|err| {
            Error::new(ErrorKind::Token)
                .with_message(ERROR_PARSE)
                .with_detail(raw)
                .with_source(err)
        })?;
        Token::new(value).ok_or_else(|| {
            Error::new(ErrorKind::Token)
                .with_message(ERROR_PARSE)
                .with_detail(raw)
        })
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}
