//! Meter identity: names and key/value tags.

use crate::error::{MetricsError, MetricsResult};
use serde::Serialize;
use std::fmt;

/// A single key/value dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Tag {
    fn from((key, value): (K, V)) -> Self {
        Tag::new(key, value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// An ordered set of tags, unique by key.
///
/// Tags are kept sorted by key. Adding a tag whose key is already present
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// An empty tag set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tag set from key/value pairs.
    pub fn of<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        Self::empty().and(tags)
    }

    /// Build a tag set from a flat list of alternating keys and values.
    pub fn from_pairs(key_values: &[&str]) -> MetricsResult<Self> {
        if key_values.len() % 2 != 0 {
            return Err(MetricsError::InvalidTags(format!(
                "size must be even, it is a set of key=value pairs (got {})",
                key_values.len()
            )));
        }

        Ok(Self::of(
            key_values
                .chunks_exact(2)
                .map(|pair| Tag::new(pair[0], pair[1])),
        ))
    }

    /// Return a new tag set with `tags` merged in.
    pub fn and<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        for tag in tags {
            let tag = tag.into();
            match self.0.binary_search_by(|t| t.key.cmp(&tag.key)) {
                Ok(pos) => self.0[pos] = tag,
                Err(pos) => self.0.insert(pos, tag),
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the tag with `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .binary_search_by(|t| t.key.as_str().cmp(key))
            .ok()
            .map(|pos| self.0[pos].value.as_str())
    }
}

impl<T: Into<Tag>> FromIterator<T> for Tags {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Tags::of(iter)
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Identity of a meter within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeterId {
    pub name: String,
    pub tags: Tags,
}

impl MeterId {
    pub fn new(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.tags.is_empty() {
            let rendered: Vec<String> = self.tags.iter().map(Tag::to_string).collect();
            write!(f, "{{{}}}", rendered.join(","))?;
        }
        Ok(())
    }
}
