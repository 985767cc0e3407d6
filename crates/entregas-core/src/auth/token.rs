use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of leading characters shown when a token is printed.
const VISIBLE_PREFIX_CHARS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token must not be empty")]
    Empty,

    #[error("Token contains control characters")]
    ControlCharacters,
}

/// Opaque session credential issued by the backend on login or registration.
///
/// `Debug` and `Display` only show a short prefix so a token never ends up in
/// log output. Use [`Token::expose`] to get the raw value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TokenError::Empty);
        }
        if value.chars().any(char::is_control) {
            return Err(TokenError::ControlCharacters);
        }
        Ok(Self(value))
    }

    /// The raw token value, for building the authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(VISIBLE_PREFIX_CHARS).collect();
        format!("{}…", prefix)
    }
}

impl TryFrom<String> for Token {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Token::new(value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
