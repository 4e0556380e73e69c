//! Type Introspection Cache (C1).
//!
//! Rust has no runtime reflection, so the contract spec §4.1 describes for a
//! managed-runtime reader is expressed here as a static trait: a target
//! record type implements [`DescribedRecord`] once, at compile time, and
//! exposes a build-time slice of [`FieldDescriptor`]s. What the cache still
//! owns at runtime is exactly what §4.1 calls out as needing thread-safe,
//! discover-once memoization: the descriptor slice is looked up by type name
//! and memoized, and a "not found" sentinel is cached so repeated misses
//! don't re-probe.

use dashmap::DashMap;
use std::any::type_name;
use std::sync::Arc;

use crate::convert::ConvertError;

/// A single field's binding: its external (spreadsheet header) name, the
/// setter that parses formatted text into the record, and the two
/// classification flags C2 and the validator consult.
pub struct FieldDescriptor<T> {
    pub external_name: &'static str,
    pub is_identifier: bool,
    pub is_date: bool,
    pub set: fn(&mut T, &str) -> Result<(), ConvertError>,
}

/// Implemented once per record type the reader produces. Takes the place of
/// the runtime reflection a managed-runtime implementation would use to
/// discover fields annotated with a column-name attribute.
pub trait DescribedRecord: Default + Send + 'static {
    fn fields() -> &'static [FieldDescriptor<Self>];

    fn field_by_external_name(name: &str) -> Option<&'static FieldDescriptor<Self>> {
        Self::fields().iter().find(|f| f.external_name == name)
    }
}

#[derive(Clone)]
enum CacheEntry {
    Found { field_count: usize },
    NotFound,
}

/// Process-wide, write-through cache of type discoveries (spec §4.1, §5).
/// Never cleared during a job; a miss is cached so the reader doesn't
/// re-probe a type it already failed to resolve.
pub struct TypeIntrospectionCache {
    entries: DashMap<&'static str, CacheEntry>,
}

impl TypeIntrospectionCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// One discovery per type (I: "one discovery per type; thread-safe").
    /// `T::fields()` is a `'static` slice computed once by the compiler, so
    /// the actual discovery cost here is the `dashmap` entry lookup/insert.
    pub fn discover<T: DescribedRecord>(&self) -> Result<&'static [FieldDescriptor<T>], TypeCacheError> {
        let name = type_name::<T>();
        let fields = T::fields();
        match self.entries.get(name).map(|e| e.clone()) {
            Some(CacheEntry::Found { .. }) => Ok(fields),
            Some(CacheEntry::NotFound) => Err(TypeCacheError::NotFound(name)),
            None => {
                if fields.is_empty() {
                    self.entries.insert(name, CacheEntry::NotFound);
                    tracing::warn!(type_name = name, "no field descriptors registered for type");
                    Err(TypeCacheError::NotFound(name))
                } else {
                    self.entries.insert(
                        name,
                        CacheEntry::Found {
                            field_count: fields.len(),
                        },
                    );
                    Ok(fields)
                }
            }
        }
    }
}

impl Default for TypeIntrospectionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TypeCacheError {
    #[error("no field descriptors found for type {0}")]
    NotFound(&'static str),
}

/// Identifier-shaped field names, per spec §4.1(d). Matched case-insensitively
/// as a substring of the external field name.
pub const IDENTIFIER_NAME_HINTS: &[&str] = &[
    "identity", "cmnd", "cccd", "passport", "phone", "mobile", "tax", "mst", "account", "code",
];

pub fn is_identifier_shaped_name(external_name: &str) -> bool {
    let lower = external_name.to_ascii_lowercase();
    IDENTIFIER_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

pub fn shared_type_cache() -> Arc<TypeIntrospectionCache> {
    Arc::new(TypeIntrospectionCache::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Dummy {
        code: String,
    }

    fn set_code(d: &mut Dummy, raw: &str) -> Result<(), ConvertError> {
        d.code = raw.to_string();
        Ok(())
    }

    static DUMMY_FIELDS: [FieldDescriptor<Dummy>; 1] = [FieldDescriptor {
        external_name: "unit_code",
        is_identifier: true,
        is_date: false,
        set: set_code,
    }];

    impl DescribedRecord for Dummy {
        fn fields() -> &'static [FieldDescriptor<Self>] {
            &DUMMY_FIELDS
        }
    }

    #[test]
    fn discover_memoizes_and_returns_same_slice() {
        let cache = TypeIntrospectionCache::new();
        let first = cache.discover::<Dummy>().unwrap();
        let second = cache.discover::<Dummy>().unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].external_name, "unit_code");
    }

    #[test]
    fn identifier_hints_match_case_insensitively() {
        assert!(is_identifier_shaped_name("CCCD_Number"));
        assert!(is_identifier_shaped_name("tax_code"));
        assert!(!is_identifier_shaped_name("quantity"));
    }
}
