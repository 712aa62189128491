//! Hierarchical path patterns such as `song_data/*/*/*/*.json`.
//!
//! Paths are relative, `/`-separated object keys. Within one segment `*`
//! matches any run of characters and `?` matches exactly one; wildcards never
//! cross a `/`. A pattern without wildcards names a directory and matches
//! every object below it.

use regex::Regex;

use crate::{Error, Result};

#[derive(Debug, Clone)]
enum Segment {
  Literal(String),
  Wildcard(Regex),
}

impl Segment {
  fn matches(&self, part: &str) -> bool {
    match self {
      Segment::Literal(s) => s == part,
      Segment::Wildcard(re) => re.is_match(part),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PathPattern {
  raw:      String,
  segments: Vec<Segment>,
}

impl PathPattern {
  pub fn parse(pattern: &str) -> Result<Self> {
    let invalid = |reason: &str| Error::InvalidPattern {
      pattern: pattern.to_owned(),
      reason:  reason.to_owned(),
    };

    let mut segments = Vec::new();
    for part in split_path(pattern) {
      if part == "." || part == ".." {
        return Err(invalid("relative segments are not allowed"));
      }
      if part.contains(['*', '?']) {
        let re = Regex::new(&segment_regex(part))
          .map_err(|e| invalid(&e.to_string()))?;
        segments.push(Segment::Wildcard(re));
      } else {
        segments.push(Segment::Literal(part.to_owned()));
      }
    }

    Ok(Self { raw: pattern.to_owned(), segments })
  }

  pub fn as_str(&self) -> &str { &self.raw }

  pub fn has_wildcards(&self) -> bool {
    self.segments.iter().any(|s| matches!(s, Segment::Wildcard(_)))
  }

  /// The leading wildcard-free segments; listing starts from here.
  pub fn literal_prefix(&self) -> Vec<&str> {
    self
      .segments
      .iter()
      .map_while(|s| match s {
        Segment::Literal(l) => Some(l.as_str()),
        Segment::Wildcard(_) => None,
      })
      .collect()
  }

  /// Whether the object at `parts` is selected by this pattern.
  pub fn matches(&self, parts: &[&str]) -> bool {
    if !self.has_wildcards() {
      return parts.len() > self.segments.len()
        && self.segments.iter().zip(parts).all(|(s, p)| s.matches(p));
    }
    parts.len() == self.segments.len()
      && self.segments.iter().zip(parts).all(|(s, p)| s.matches(p))
  }

  pub fn matches_path(&self, path: &str) -> bool {
    let parts: Vec<&str> = split_path(path).collect();
    self.matches(&parts)
  }
}

/// Split a `/`-separated path, dropping empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
  path.split('/').filter(|p| !p.is_empty())
}

fn segment_regex(segment: &str) -> String {
  let mut re = String::from("^");
  for c in segment.chars() {
    match c {
      '*' => re.push_str(".*"),
      '?' => re.push('.'),
      other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
    }
  }
  re.push('$');
  re
}
