//! Identifiers and the declaration registry
//!
//! Samples and events share one flat namespace. The registry is populated in
//! section order (samples, filter, events, choice, yield) while a query is
//! built, so a reference can only ever resolve to something declared earlier.

use crate::query::error::{QueryError, QueryResult};
use serde::Serialize;
use std::collections::HashMap;

/// Prefix reserved for built-in names such as `_input`
pub const RESERVED_PREFIX: &str = "_";

/// A validated name of a sample or event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap a name
    ///
    /// A name must be non-empty, start with an ASCII letter and contain only
    /// ASCII letters and digits.
    pub fn new(name: impl Into<String>) -> QueryResult<Self> {
        let name = name.into();

        let reason = if name.is_empty() {
            Some("must not be empty")
        } else if name.starts_with(RESERVED_PREFIX) {
            Some("the '_' prefix is reserved")
        } else if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            Some("must start with a letter")
        } else if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some("may only contain ASCII letters and digits")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(QueryError::InvalidIdentifier {
                name,
                reason: reason.to_string(),
            }),
            None => Ok(Self(name)),
        }
    }

    /// The underlying name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Identifier {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a declared identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// A sample declared in the SAMPLES section
    Sample,
    /// An event declared in the EVENTS section
    Event,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sample => write!(f, "sample"),
            Self::Event => write!(f, "event"),
        }
    }
}

/// Flat registry of declared identifiers, keyed by name
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    kinds: HashMap<Identifier, IdentifierKind>,
    order: Vec<Identifier>,
}

impl IdentifierRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new identifier
    ///
    /// Fails with `DuplicateIdentifier` if the name is already declared,
    /// regardless of its kind.
    pub fn declare(&mut self, identifier: &Identifier, kind: IdentifierKind) -> QueryResult<()> {
        if self.kinds.contains_key(identifier) {
            return Err(QueryError::DuplicateIdentifier(identifier.name().to_string()));
        }

        self.kinds.insert(identifier.clone(), kind);
        self.order.push(identifier.clone());
        Ok(())
    }

    /// Resolve a reference that must point at an identifier of `expected` kind
    pub fn resolve(&self, identifier: &Identifier, expected: IdentifierKind) -> QueryResult<()> {
        match self.kinds.get(identifier) {
            None => Err(QueryError::UnknownIdentifier(identifier.name().to_string())),
            Some(found) if *found != expected => Err(QueryError::InvalidReference {
                name: identifier.name().to_string(),
                expected,
                found: *found,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Kind of a declared identifier
    pub fn kind_of(&self, identifier: &Identifier) -> Option<IdentifierKind> {
        self.kinds.get(identifier).copied()
    }

    /// Declared identifiers in declaration order
    pub fn identifiers(&self) -> &[Identifier] {
        &self.order
    }

    /// Number of declared identifiers
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
