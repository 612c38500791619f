use super::error::EntityError;
use super::is_alphanumeric;

/// Canonical entity ordering for structured filenames.
///
/// Newly inserted entities land at the position this list dictates; entities
/// not listed here sort after all known ones in arrival order.
pub const CANONICAL_ENTITY_ORDER: [&str; 18] = [
    "sub",
    "ses",
    "task",
    "acq",
    "ce",
    "dir",
    "rec",
    "run",
    "echo",
    "flip",
    "inv",
    "mt",
    "part",
    "recording",
    "space",
    "split",
    "desc",
    "label",
];

/// Rank of an entity in the canonical order; unknown entities rank last.
#[must_use]
pub fn order_index(entity: &str) -> usize {
    CANONICAL_ENTITY_ORDER
        .iter()
        .position(|known| *known == entity)
        .unwrap_or(CANONICAL_ENTITY_ORDER.len() + 1)
}

/// Ordered entity map backing one structured filename.
///
/// Keys are unique. Iteration order is the order entries were parsed in,
/// with [`EntityMap::set`] placing brand-new keys at their canonical
/// position among the keys already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMap {
    entries: Vec<(String, String)>,
}

impl EntityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from parsed (key, value) pairs, keeping source order.
    /// A repeated key keeps its first position and the last value.
    pub(super) fn from_parsed(pairs: Vec<(String, String)>) -> Self {
        let mut map = Self::new();
        for (key, value) in pairs {
            match map.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => map.entries.push((key, value)),
            }
        }
        map
    }

    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == entity)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.get(entity).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Update an entity in place, or insert it at its canonical position.
    ///
    /// # Errors
    /// * `EntityError::EmptyValue` when the trimmed value is blank.
    /// * `EntityError::InvalidValue` when the value is not alphanumeric.
    pub fn set(&mut self, entity: &str, value: &str) -> Result<(), EntityError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(EntityError::EmptyValue {
                entity: entity.to_string(),
            });
        }
        if !is_alphanumeric(value) {
            return Err(EntityError::InvalidValue {
                key: entity.to_string(),
                value: value.to_string(),
            });
        }

        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == entity) {
            entry.1 = value.to_string();
            return Ok(());
        }

        let rank = order_index(entity);
        let position = self
            .entries
            .iter()
            .position(|(existing, _)| rank < order_index(existing))
            .unwrap_or(self.entries.len());
        self.entries
            .insert(position, (entity.to_string(), value.to_string()));
        Ok(())
    }

    /// Remove an entity, reporting whether it was present.
    ///
    /// # Errors
    /// Returns `EntityError::ProtectedEntity` when asked to remove `sub`.
    pub fn remove(&mut self, entity: &str) -> Result<bool, EntityError> {
        if entity == "sub" {
            return Err(EntityError::ProtectedEntity);
        }
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != entity);
        Ok(self.entries.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(pairs: &[(&str, &str)]) -> EntityMap {
        EntityMap::from_parsed(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn set_inserts_at_canonical_position() {
        let mut map = map_of(&[("sub", "01"), ("task", "rest"), ("echo", "2")]);
        map.set("run", "1").unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["sub", "task", "run", "echo"]);
    }

    #[test]
    fn set_orders_regardless_of_insertion_sequence() {
        let mut a = map_of(&[("sub", "01")]);
        a.set("run", "1").unwrap();
        a.set("task", "rest").unwrap();
        a.set("ses", "2").unwrap();

        let mut b = map_of(&[("sub", "01")]);
        b.set("ses", "2").unwrap();
        b.set("task", "rest").unwrap();
        b.set("run", "1").unwrap();

        assert_eq!(a, b);
        let keys: Vec<&str> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["sub", "ses", "task", "run"]);
    }

    #[test]
    fn unknown_entities_sort_after_known_ones() {
        let mut map = map_of(&[("sub", "01"), ("mystery", "x")]);
        map.set("task", "rest").unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["sub", "task", "mystery"]);
    }

    #[test]
    fn set_updates_existing_value_in_place() {
        let mut map = map_of(&[("sub", "01"), ("run", "1")]);
        map.set("run", "2").unwrap();
        assert_eq!(map.get("run"), Some("2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn set_rejects_blank_and_invalid_values() {
        let mut map = map_of(&[("sub", "01")]);
        assert!(matches!(
            map.set("acq", "  "),
            Err(EntityError::EmptyValue { .. })
        ));
        assert!(matches!(
            map.set("acq", "high-res"),
            Err(EntityError::InvalidValue { .. })
        ));
    }

    #[test]
    fn remove_protects_subject() {
        let mut map = map_of(&[("sub", "01"), ("acq", "mprage")]);
        assert!(matches!(map.remove("sub"), Err(EntityError::ProtectedEntity)));
        assert_eq!(map.remove("acq"), Ok(true));
        assert_eq!(map.remove("acq"), Ok(false));
    }

    #[test]
    fn duplicate_parsed_keys_keep_first_position_last_value() {
        let map = map_of(&[("sub", "01"), ("task", "a"), ("run", "1"), ("task", "b")]);
        let entries: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(entries, vec![("sub", "01"), ("task", "b"), ("run", "1")]);
    }
}
