//! Property-path resolution
//!
//! A property path such as `"host.info.name"` addresses a property on a
//! nested object rooted at the global object. Resolution walks every
//! segment but the last, creating empty objects where nothing (or `null`,
//! or `undefined`) is stored, and stops with the parent object and the
//! final key. The final property itself is neither read nor written.

use crate::engine::Engine;
use crate::error::{Error, Result};

/// A validated dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath<'a> {
    segments: Vec<&'a str>,
}

impl<'a> PropertyPath<'a> {
    /// Split and validate `path`. Rejects the empty path and empty
    /// segments (`"a..b"`, `".a"`, `"a."`).
    pub fn parse(path: &'a str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::EmptyPath);
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(Error::EmptySegment);
        }
        Ok(Self { segments })
    }

    /// Final segment
    pub fn key(&self) -> &'a str {
        // parse() guarantees at least one segment
        self.segments[self.segments.len() - 1]
    }

    /// Every segment but the last
    pub fn parents(&self) -> &[&'a str] {
        &self.segments[..self.segments.len() - 1]
    }

    /// `true` for a single-segment path
    pub fn is_plain(&self) -> bool {
        self.segments.len() == 1
    }
}

/// Walk `path` from the realm's global object and return the object that
/// owns the final key.
pub fn resolve<E: Engine>(
    engine: &mut E,
    realm: &E::Realm,
    path: &PropertyPath<'_>,
) -> Result<E::Object> {
    let mut current = engine.global(realm);

    for segment in path.parents() {
        let next = engine.get(realm, &current, segment)?;
        let kind = engine.kind(&next);

        current = if kind.is_nullish() {
            let fresh = engine.new_object(realm);
            let fresh_value = engine.object_value(&fresh);
            engine.set(realm, &current, segment, &fresh_value)?;
            fresh
        } else if let Some(object) = engine.as_object(&next).filter(|_| kind.is_object()) {
            object
        } else {
            return Err(Error::PathConflict {
                segment: (*segment).to_string(),
            });
        };
    }

    Ok(current)
}
