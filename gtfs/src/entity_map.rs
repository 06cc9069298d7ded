use std::collections::BTreeMap;

use anyhow::Result;

use crate::EntityError;

/// Translates the key an entity had in the source feed into the key the destination assigned it.
/// One of these lives for a whole copy. Entries are only added, never changed.
#[derive(Default)]
pub struct EntityMap {
    // filename -> source key -> destination key
    ids: BTreeMap<String, BTreeMap<String, String>>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping. Setting the same pair again is fine; changing an existing mapping isn't.
    pub fn set(&mut self, filename: &str, source: &str, dest: &str) -> Result<()> {
        let ids = self.ids.entry(filename.to_string()).or_default();
        if let Some(existing) = ids.get(source) {
            if existing != dest {
                bail!(
                    "EntityMap already maps {filename} '{source}' to '{existing}', can't remap to '{dest}'"
                );
            }
            return Ok(());
        }
        ids.insert(source.to_string(), dest.to_string());
        Ok(())
    }

    pub fn get(&self, filename: &str, source: &str) -> Option<&str> {
        self.ids
            .get(filename)
            .and_then(|ids| ids.get(source))
            .map(|x| x.as_str())
    }

    pub fn contains(&self, filename: &str, source: &str) -> bool {
        self.get(filename, source).is_some()
    }

    pub fn len(&self, filename: &str) -> usize {
        self.ids.get(filename).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Rewrites a required foreign key in place.
    pub fn resolve(
        &self,
        filename: &str,
        field: &str,
        key: &mut String,
    ) -> Result<(), EntityError> {
        match self.get(filename, key) {
            Some(dest) => {
                *key = dest.to_string();
                Ok(())
            }
            None if key.is_empty() => Err(EntityError::required(field)),
            None => Err(EntityError::reference(field, key)),
        }
    }

    /// Rewrites an optional foreign key in place. Empty keys stay empty.
    pub fn resolve_optional(
        &self,
        filename: &str,
        field: &str,
        key: &mut Option<String>,
    ) -> Result<(), EntityError> {
        if let Some(k) = key.as_mut() {
            if !k.is_empty() {
                return self.resolve(filename, field, k);
            }
        }
        *key = None;
        Ok(())
    }
}
