//! Namespaced record keys.
//!
//! Every record lives under one of three prefixes: `tag:<name>`, `id:<n>` and
//! `token:<token>`. Enumeration only ever happens by scanning one namespace's
//! key range.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Tag,
    Id,
    Token,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Tag => "tag:",
            Namespace::Id => "id:",
            Namespace::Token => "token:",
        }
    }

    /// Half-open key range `[low, high)` covering the whole namespace.
    ///
    /// The upper bound swaps the trailing `:` for `;`, the next byte.
    pub fn range(self) -> (String, String) {
        let prefix = self.prefix();
        let stem = &prefix[..prefix.len() - 1];
        (prefix.to_string(), format!("{stem};"))
    }

    /// Returns the logical part of `key` when it belongs to this namespace.
    pub fn strip<'a>(self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Tag(String),
    Id(u64),
    Token(String),
}

impl RecordKey {
    pub fn tag(name: impl Into<String>) -> Self {
        RecordKey::Tag(name.into())
    }

    pub fn token(token: impl Into<String>) -> Self {
        RecordKey::Token(token.into())
    }

}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Tag(name) => write!(f, "tag:{name}"),
            RecordKey::Id(id) => write!(f, "id:{id}"),
            RecordKey::Token(token) => write!(f, "token:{token}"),
        }
    }
}

/// Range of token keys starting with `token_prefix`.
///
/// Tokens are lowercase ASCII alphanumerics, so `~` sorts after every
/// continuation.
pub fn token_prefix_range(token_prefix: &str) -> (String, String) {
    (
        format!("token:{token_prefix}"),
        format!("token:{token_prefix}~"),
    )
}
