//! Regex queries over object properties.
//!
//! How keys and patterns combine depends on how many of each a query has:
//!
//! | keys (k) vs patterns (p) | an object matches when                          |
//! |--------------------------|-------------------------------------------------|
//! | p == 0                   | never; the query is rejected                    |
//! | k == 0                   | every pattern matches some property value       |
//! | k > p                    | every pattern matches the value of some key     |
//! | p > k                    | every pattern matches the values of all keys    |
//! | k == p                   | each pattern matches the value of its own key   |
//!
//! A key the object lacks never matches.
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::identifier::Identifier;
use crate::object::ConfigObject;
use crate::schema::is_known_property;
use crate::store::ObjectStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query has no patterns")]
    NoPatterns,
    #[error("empty key")]
    EmptyKey,
    #[error("unknown property key {0:?}")]
    UnknownKey(String),
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    AnyProperty,
    AnyKey,
    AllKeys,
    Pairs,
}

// ------------- Query -------------
#[derive(Clone, Debug, Default)]
pub struct Query {
    keys: Vec<String>,
    patterns: Vec<Regex>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_pattern(&mut self, pattern: &str) -> Result<&mut Self, QueryError> {
        let rx = compile(pattern)?;
        self.patterns.push(rx);
        Ok(self)
    }
    pub fn add_key(&mut self, key: &str) -> Result<&mut Self, QueryError> {
        validate_key(key)?;
        self.keys.push(key.to_string());
        Ok(self)
    }
    /// Adds a key and a pattern together. Nothing is added unless both are valid.
    pub fn add_key_pattern(&mut self, key: &str, pattern: &str) -> Result<&mut Self, QueryError> {
        validate_key(key)?;
        let rx = compile(pattern)?;
        self.keys.push(key.to_string());
        self.patterns.push(rx);
        Ok(self)
    }
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }
    pub fn is_balanced(&self) -> bool {
        self.keys.len() == self.patterns.len()
    }
    /// The matching mode, or `None` for a query without patterns.
    pub fn mode(&self) -> Option<Mode> {
        let (k, p) = (self.keys.len(), self.patterns.len());
        match (k, p) {
            (_, 0) => None,
            (0, _) => Some(Mode::AnyProperty),
            _ if k > p => Some(Mode::AnyKey),
            _ if p > k => Some(Mode::AllKeys),
            _ => Some(Mode::Pairs),
        }
    }

    /// Evaluates the query against one object.
    pub fn matches(&self, object: &ConfigObject) -> Result<bool, QueryError> {
        let mode = self.mode().ok_or(QueryError::NoPatterns)?;
        Ok(match mode {
            Mode::Pairs => object.matches_pairs(self),
            _ => self.patterns.iter().all(|rx| self.matches_one(object, mode, rx)),
        })
    }

    /// Identifiers of matching objects, in scan order. The scan covers the
    /// subset when one is given (identifiers not in the store are skipped),
    /// else the whole store in its insertion order.
    pub fn search(
        &self,
        store: &ObjectStore,
        subset: Option<&[Identifier]>,
    ) -> Result<Vec<Identifier>, QueryError> {
        let mode = self.mode().ok_or(QueryError::NoPatterns)?;
        let mut current: Vec<Identifier> = match subset {
            Some(ids) => ids.iter().filter(|id| store.contains(id)).copied().collect(),
            None => store.keys(),
        };
        if mode == Mode::Pairs {
            current.retain(|id| store.get(id).is_some_and(|object| object.matches_pairs(self)));
            return Ok(current);
        }
        // each pattern narrows the result of the previous one
        for rx in &self.patterns {
            if current.is_empty() {
                break;
            }
            current.retain(|id| {
                store
                    .get(id)
                    .is_some_and(|object| self.matches_one(object, mode, rx))
            });
        }
        Ok(current)
    }

    fn matches_one(&self, object: &ConfigObject, mode: Mode, rx: &Regex) -> bool {
        match mode {
            Mode::AnyProperty => object.matches_any(rx),
            Mode::AnyKey => object.matches_any_key(rx, self.keys.as_slice()),
            Mode::AllKeys => object.matches_all_keys(rx, self.keys.as_slice()),
            Mode::Pairs => object.matches_pairs(self),
        }
    }
}

fn validate_key(key: &str) -> Result<(), QueryError> {
    if key.is_empty() {
        warn!("empty query key rejected");
        return Err(QueryError::EmptyKey);
    }
    if !is_known_property(key) {
        warn!(key, "unknown query key rejected");
        return Err(QueryError::UnknownKey(key.to_string()));
    }
    Ok(())
}

fn compile(pattern: &str) -> Result<Regex, QueryError> {
    Regex::new(pattern).map_err(|e| {
        warn!(pattern, error = %e, "invalid query pattern rejected");
        QueryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }
    })
}
