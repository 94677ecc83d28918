use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use crate::compose::ComposeConfig;

/// Registry image reference (`registry/repo:tag`). Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ImageReference {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageReference {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ImageReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Set of image references with O(1) membership by plain string.
///
/// Used both for the images watched in a cycle and for the cycle's update set.
/// Iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    images: HashSet<ImageReference>,
}

/// Images found to have a newer version during one cycle
pub type UpdateSet = ImageSet;

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the reference was already present
    pub fn insert(&mut self, image: impl Into<ImageReference>) -> bool {
        self.images.insert(image.into())
    }

    pub fn contains(&self, image: &str) -> bool {
        self.images.contains(image)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageReference> {
        self.images.iter()
    }

    /// Sorted copy, for logs and messages
    pub fn to_sorted_vec(&self) -> Vec<ImageReference> {
        let mut images: Vec<_> = self.images.iter().cloned().collect();
        images.sort();
        images
    }
}

impl fmt::Display for ImageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let images: Vec<String> = self
            .to_sorted_vec()
            .into_iter()
            .map(|image| image.0)
            .collect();
        write!(f, "[{}]", images.join(", "))
    }
}

impl<I: Into<ImageReference>> FromIterator<I> for ImageSet {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self {
            images: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<I: Into<ImageReference>> Extend<I> for ImageSet {
    fn extend<T: IntoIterator<Item = I>>(&mut self, iter: T) {
        self.images.extend(iter.into_iter().map(Into::into));
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a ImageReference;
    type IntoIter = std::collections::hash_set::Iter<'a, ImageReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

/// Deduplicated images of every watched service across all configs
pub fn unique_images<'a>(configs: impl IntoIterator<Item = &'a ComposeConfig>) -> ImageSet {
    let mut images = ImageSet::new();
    for config in configs {
        for service in config.services() {
            if !service.is_watched() {
                log::debug!(
                    "skipping {} from {}: watching disabled",
                    service.name,
                    config.path().display()
                );
                continue;
            }
            if let Some(image) = &service.image {
                images.insert(image.clone());
            }
        }
    }
    images
}
