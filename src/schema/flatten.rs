//! Flattening of nested schema references.

use indexmap::IndexMap;
use std::sync::Arc;

use super::ParsedSchema;

/// Flattens a tree of resolved references into a single map.
///
/// Every schema reachable from `references` contributes one entry, keyed by
/// `key(reference_name, schema)` and holding `value(schema)`. Nested
/// dependencies are flattened before the schema that consumed them, and
/// later entries overwrite earlier ones with the same key.
///
/// The function is pure: it neither mutates its input nor depends on any
/// state outside it, so flattening the same tree twice yields equal maps.
///
/// # Example
///
/// ```rust
/// use indexmap::IndexMap;
/// use schemaguard::schema::{flatten_references, ParsedSchema};
/// use std::sync::Arc;
///
/// let leaf = Arc::new(ParsedSchema::new((), b"leaf".to_vec()).with_reference_name("leaf"));
/// let mid = Arc::new(ParsedSchema::new((), b"mid".to_vec()).with_references(vec![leaf]));
///
/// let mut references = IndexMap::new();
/// references.insert("mid".to_string(), mid);
///
/// let flat = flatten_references(&references, &|name, _| name.to_string(), &|s| s.raw_text().into_owned());
/// assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["leaf", "mid"]);
/// ```
pub fn flatten_references<S, K, V, T>(
    references: &IndexMap<String, Arc<ParsedSchema<S>>>,
    key: &K,
    value: &V,
) -> IndexMap<String, T>
where
    K: Fn(&str, &ParsedSchema<S>) -> String,
    V: Fn(&ParsedSchema<S>) -> T,
{
    references
        .iter()
        .map(|(name, schema)| flatten_one(name, schema, key, value))
        .fold(IndexMap::new(), merge)
}

fn flatten_one<S, K, V, T>(name: &str, schema: &ParsedSchema<S>, key: &K, value: &V) -> IndexMap<String, T>
where
    K: Fn(&str, &ParsedSchema<S>) -> String,
    V: Fn(&ParsedSchema<S>) -> T,
{
    let nested = schema
        .references()
        .iter()
        .map(|child| flatten_one(child.reference_name().unwrap_or_default(), child, key, value))
        .fold(IndexMap::new(), merge);

    let mut own = IndexMap::with_capacity(1);
    own.insert(key(name, schema), value(schema));
    merge(nested, own)
}

// Last write wins.
fn merge<T>(mut left: IndexMap<String, T>, right: IndexMap<String, T>) -> IndexMap<String, T> {
    left.extend(right);
    left
}
