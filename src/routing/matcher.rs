//! Route template parsing and path matching.
//!
//! # Rules
//! - Template and path are split on `/`; segment counts must be equal
//! - Literal segments compare case-sensitively
//! - `:name` segments capture the path segment; empty segments never match a parameter
//! - No wildcards, optional segments or trailing-slash normalization

use std::collections::{BTreeMap, HashSet};

use crate::core::error::{BridgeError, BridgeResult};

pub const SEGMENT_DELIMITER: char = '/';
const PARAM_PREFIX: char = ':';

/// Parameters extracted from a matched path, keyed by parameter name
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template such as `classrooms/:classId/students`.
    pub fn parse(template: &str) -> BridgeResult<Self> {
        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for part in template.split(SEGMENT_DELIMITER) {
            match part.strip_prefix(PARAM_PREFIX) {
                Some("") => {
                    return Err(BridgeError::InvalidTemplate {
                        template: template.to_string(),
                        reason: "parameter segment without a name".to_string(),
                    })
                }
                Some(name) => {
                    if !seen.insert(name) {
                        return Err(BridgeError::InvalidTemplate {
                            template: template.to_string(),
                            reason: format!("parameter '{name}' appears more than once"),
                        });
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the parameters in declaration order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches a concrete path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split(SEGMENT_DELIMITER).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// True when both templates accept exactly the same set of paths.
    /// Parameter names are irrelevant to structure.
    pub fn same_structure(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// True when every path accepted by `other` is also accepted by `self`.
    pub fn covers(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Param(_), _) => true,
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Literal(_), Segment::Param(_)) => false,
                })
    }
}

/// Outcome of a one-off template match
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    pub params: PathParams,
}

/// Matches `path` against an uncompiled `template`. Invalid templates never match.
pub fn match_path(template: &str, path: &str) -> MatchOutcome {
    match PathTemplate::parse(template)
        .ok()
        .and_then(|t| t.matches(path))
    {
        Some(params) => MatchOutcome {
            matched: true,
            params,
        },
        None => MatchOutcome::default(),
    }
}
