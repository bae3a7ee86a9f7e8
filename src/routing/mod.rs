//! Path-based routing for inter-process calls
//!
//! Templates are compiled once at registration and resolved with an ordered
//! scan: the first structural match for a verb wins.

pub mod matcher;
pub mod registry;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use matcher::{match_path, MatchOutcome, PathParams, PathTemplate, Segment};
pub use registry::{ResolvedRoute, RouteRegistry};

/// Verbs accepted by the route registry. Both ingress modes parse them
/// through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    /// Parses a verb (case-insensitive).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(format!("unsupported verb '{value}'")),
        }
    }
}

impl TryFrom<String> for Verb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_parse_case_insensitive() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("POST".parse::<Verb>().unwrap(), Verb::Post);
        assert_eq!("Put".parse::<Verb>().unwrap(), Verb::Put);
        assert_eq!("delete".parse::<Verb>().unwrap(), Verb::Delete);
        assert!("PATCH".parse::<Verb>().is_err());
    }

    #[test]
    fn verb_serde_uses_uppercase() {
        assert_eq!(serde_json::to_string(&Verb::Delete).unwrap(), "\"DELETE\"");
        let verb: Verb = serde_json::from_str("\"GET\"").unwrap();
        assert_eq!(verb, Verb::Get);
    }

    #[test]
    fn verb_serde_matches_from_str() {
        let verb: Verb = serde_json::from_str("\"get\"").unwrap();
        assert_eq!(verb, Verb::Get);
        let verb: Verb = serde_json::from_str("\"Delete\"").unwrap();
        assert_eq!(verb, Verb::Delete);
        assert!(serde_json::from_str::<Verb>("\"PATCH\"").is_err());
    }
}
