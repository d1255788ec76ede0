use crate::types::SqlValue;

/// Ordered association of named placeholders to the values bound for them.
///
/// Keys are stored with their `:` sentinel, so `"id"` and `":id"` name the
/// same entry. Insertion order is preserved; re-inserting a key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindMap {
    entries: Vec<(String, SqlValue)>,
}

impl BindMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value, builder style.
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a named value.
    pub fn insert(&mut self, name: &str, value: impl Into<SqlValue>) {
        let key = placeholder_key(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let key = placeholder_key(name);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Placeholder names, sentinel included, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<SqlValue>> FromIterator<(K, V)> for BindMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = BindMap::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

impl<K: AsRef<str>, V: Into<SqlValue>, const N: usize> From<[(K, V); N]> for BindMap {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

fn placeholder_key(name: &str) -> String {
    if name.starts_with(':') {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}
