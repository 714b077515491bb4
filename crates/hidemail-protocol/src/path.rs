//! Positional element locators.
//!
//! A locator is the root-to-element sequence of child indices captured when a
//! helper control is attached. Native element ids are absent or unstable on
//! the pages we target, so a late response re-finds its field through this
//! snapshot instead of a live reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPath {
    segments: Vec<u32>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("element_path_empty")]
    Empty,
    #[error("element_path_invalid_segment:{segment}")]
    InvalidSegment { segment: String },
}

impl ElementPath {
    #[must_use]
    pub fn new(segments: Vec<u32>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Locator of the `index`-th child of this element.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index);
        Self { segments }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// True when `self` locates an element inside the subtree rooted at
    /// `ancestor` (or is that element itself).
    #[must_use]
    pub fn is_within(&self, ancestor: &ElementPath) -> bool {
        self.segments.len() >= ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ElementPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = trimmed
            .split('/')
            .map(|segment| {
                segment
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| PathError::InvalidSegment {
                        segment: segment.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}
