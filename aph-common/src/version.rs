//! Tool-kit version identifiers and their ordering.
//!
//! Versions are strings such as `222`, `305u3`, `310b43` or `310r20210706`.
//! They are ordered segment by segment: runs of digits compare numerically,
//! other runs compare lexically, a digit run sorts before a letter run, and a
//! version that is a prefix of another sorts first. This keeps `304 < 310`,
//! `310b43 < 310r20210706` and `99 < 222`, which plain string ordering gets
//! wrong for the last pair.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ToolkitVersion(String);

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Number(&'a str),
    Text(&'a str),
}

impl ToolkitVersion {
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty tool-kit version".to_string());
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(format!("tool-kit version '{trimmed}' contains whitespace"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        let bytes = self.0.as_bytes();
        let mut start = 0;
        while start < bytes.len() {
            let digit = bytes[start].is_ascii_digit();
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() == digit {
                end += 1;
            }
            let run = &self.0[start..end];
            segments.push(if digit {
                Segment::Number(run)
            } else {
                Segment::Text(run)
            });
            start = end;
        }
        segments
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Ord for ToolkitVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.segments();
        let right = other.segments();
        for (a, b) in left.iter().zip(right.iter()) {
            let ordering = match (a, b) {
                (Segment::Number(a), Segment::Number(b)) => compare_numbers(a, b),
                (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
                (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
                (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.len().cmp(&right.len())
    }
}

impl PartialOrd for ToolkitVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ToolkitVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ToolkitVersion {}

impl fmt::Display for ToolkitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ToolkitVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ToolkitVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ToolkitVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Catalogues written by hand sometimes carry bare numbers (`"jckit": 222`).
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
