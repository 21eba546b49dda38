// ============================================================================
// Schema Dictionary
// Name-to-descriptor resolution with optional feed-specific renaming
// ============================================================================

use super::FieldDescriptor;
use crate::domain::FieldType;
use std::collections::HashMap;
use std::sync::Arc;

/// The schema dictionary supplied by the transport layer: every field the
/// feed can publish, keyed by name.
///
/// Resolution is the only lookup the listeners perform against it; message
/// decoding afterwards goes through fid-indexed dispatch tables.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    by_name: HashMap<String, Arc<FieldDescriptor>>,
    max_fid: u16,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from `(fid, name, type)` entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u16, S, FieldType)>,
        S: Into<String>,
    {
        let mut dict = Self::new();
        for (fid, name, field_type) in entries {
            dict.add(fid, name, field_type);
        }
        dict
    }

    pub fn add(&mut self, fid: u16, name: impl Into<String>, field_type: FieldType) {
        let name = name.into();
        self.max_fid = self.max_fid.max(fid);
        self.by_name
            .insert(name.clone(), Arc::new(FieldDescriptor::new(fid, name, field_type)));
    }

    /// Resolve one field by its published name. `None` when the feed does not
    /// carry the field.
    pub fn field_by_name(&self, name: &str) -> Option<Arc<FieldDescriptor>> {
        self.by_name.get(name).cloned()
    }

    /// Highest fid in the schema; dispatch tables size their slot arrays
    /// from this.
    pub fn max_fid(&self) -> u16 {
        self.max_fid
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Optional name-to-name remapping, for feeds that publish standard fields
/// under their own names (e.g. `wSymbol` arriving as `mSym`).
///
/// Listeners resolve every logical name through the alias table before
/// querying the dictionary; names without an alias resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct FieldAliases {
    mapping: HashMap<String, String>,
}

impl FieldAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            mapping: pairs
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        }
    }

    pub fn alias(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.mapping.insert(from.into(), to.into());
    }

    /// The name to look up in the dictionary for a logical field name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.mapping.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Resolve a logical name against the dictionary, honoring aliases.
pub(crate) fn lookup(
    dictionary: &Dictionary,
    aliases: Option<&FieldAliases>,
    name: &str,
) -> Option<Arc<FieldDescriptor>> {
    let resolved = match aliases {
        Some(aliases) => aliases.resolve(name),
        None => name,
    };
    dictionary.field_by_name(resolved)
}
