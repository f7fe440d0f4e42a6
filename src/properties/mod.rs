//! Property Store and Resolver
//!
//! `PropertyStore` is the string key/value map used for both per-server local
//! properties and the process-wide runtime configuration. `PropertyResolver`
//! layers a server's local store over the global one.

pub mod codec;

use std::collections::BTreeMap;

use crate::utils::error::Result;

/// Parse a boolean property value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Split a comma separated value, trimming entries and dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ordered string key/value store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyStore {
    props: BTreeMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a TOML table
    ///
    /// Nested tables become dotted keys and arrays are joined with `,`, so
    /// `[DCServer] name = "x"` yields `DCServer.name = x`.
    pub fn from_toml_table(table: &toml::Table) -> Self {
        let mut store = Self::new();
        store.merge_toml_table("", table);
        store
    }

    /// Parse TOML text into a flattened store
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text)?;
        Ok(Self::from_toml_table(&table))
    }

    /// Merge a TOML table, prefixing every flattened key with `prefix`
    pub fn merge_toml_table(&mut self, prefix: &str, table: &toml::Table) {
        for (key, value) in table {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                toml::Value::Table(inner) => self.merge_toml_table(&full_key, inner),
                other => {
                    self.set(full_key, toml_scalar_string(other));
                }
            }
        }
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.props.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.props.remove(key)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys starting with `prefix`, in key order
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.props
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Copy every entry of `other` into this store, overwriting existing keys
    pub fn merge(&mut self, other: &PropertyStore) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_bool)
    }

    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(parse_list)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = PropertyStore::new();
        for (k, v) in iter {
            store.set(k, v);
        }
        store
    }
}

/// String form of a non-table TOML value
pub fn toml_scalar_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(toml_scalar_string)
            .collect::<Vec<_>>()
            .join(","),
        toml::Value::Table(_) => String::new(),
        other => other.to_string(),
    }
}

/// Layered property lookup for one named server
///
/// Lookup order, first hit wins:
/// 1. exact key in the local store
/// 2. `<name>.<key>` in the local store
/// 3. `<name>.<key>` in the global store
/// 4. exact key in the global store
#[derive(Debug, Clone, Copy)]
pub struct PropertyResolver<'a> {
    name: &'a str,
    local: &'a PropertyStore,
    global: &'a PropertyStore,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(name: &'a str, local: &'a PropertyStore, global: &'a PropertyStore) -> Self {
        Self {
            name,
            local,
            global,
        }
    }

    /// Qualify `key` with the server name unless it already is
    ///
    /// A blank key normalizes to the empty string.
    pub fn normalize_key(&self, key: &str) -> String {
        let key = key.trim();
        if key.is_empty() {
            return String::new();
        }
        let prefix_len = self.name.len();
        if key.len() > prefix_len
            && key.starts_with(self.name)
            && key.as_bytes()[prefix_len] == b'.'
        {
            key.to_string()
        } else {
            format!("{}.{}", self.name, key)
        }
    }

    /// Raw value for the first alias found, walking the four levels in order
    pub fn lookup_any(&self, keys: &[&str]) -> Option<&'a str> {
        let keys: Vec<&str> = keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return None;
        }
        let normalized: Vec<String> = keys.iter().map(|k| self.normalize_key(k)).collect();

        keys.iter()
            .find_map(|k| self.local.get(k))
            .or_else(|| normalized.iter().find_map(|k| self.local.get(k)))
            .or_else(|| normalized.iter().find_map(|k| self.global.get(k)))
            .or_else(|| keys.iter().find_map(|k| self.global.get(k)))
    }

    pub fn lookup(&self, key: &str) -> Option<&'a str> {
        self.lookup_any(&[key])
    }

    /// Resolve `key`, returning `default` if no level defines it
    pub fn resolve(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or(default).to_string()
    }

    /// Resolve the first of several alias keys
    pub fn resolve_any(&self, keys: &[&str], default: &str) -> String {
        self.lookup_any(keys).unwrap_or(default).to_string()
    }

    /// True if any alias is defined at any level, even with an empty value
    pub fn contains_any(&self, keys: &[&str]) -> bool {
        self.lookup_any(keys).is_some()
    }

    pub fn resolve_i64(&self, keys: &[&str], default: i64) -> i64 {
        self.lookup_any(keys)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn resolve_f64(&self, keys: &[&str], default: f64) -> f64 {
        self.lookup_any(keys)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn resolve_bool(&self, keys: &[&str], default: bool) -> bool {
        self.lookup_any(keys)
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    /// Comma separated list, or `None` if no alias is defined
    pub fn resolve_list(&self, keys: &[&str]) -> Option<Vec<String>> {
        self.lookup_any(keys).map(parse_list)
    }

    /// Keys beginning with `prefix` across both stores, raw and qualified
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let qualified = self.normalize_key(prefix);
        let mut keys: Vec<String> = [self.local, self.global]
            .iter()
            .flat_map(|store| {
                let mut found = store.keys_with_prefix(prefix);
                found.extend(store.keys_with_prefix(&qualified));
                found
            })
            .map(str::to_string)
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
