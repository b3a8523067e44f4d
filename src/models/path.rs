// Dotted attribute paths: `top.sub` or `top.sub.leaf`.

use crate::error::PathError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const MIN_SEGMENTS: usize = 2;
pub const MAX_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    /// Builds a path from already-split segments. Segments must be non-empty and dot-free.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if !(MIN_SEGMENTS..=MAX_SEGMENTS).contains(&segments.len()) {
            return Err(PathError::SegmentCount(segments.len()));
        }
        if segments.iter().any(|s| s.is_empty() || s.contains('.')) {
            return Err(PathError::EmptySegment(segments.join(".")));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for AttributePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('.').collect();
        if !(MIN_SEGMENTS..=MAX_SEGMENTS).contains(&segments.len()) {
            return Err(PathError::SegmentCount(segments.len()));
        }
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        Ok(Self {
            segments: segments.into_iter().map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl Serialize for AttributePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
