//! [`FullType`] and [`Component`]: the identity model shared by every
//! stage of the pipeline.

use crate::error::SequencerError;
use std::fmt;
use std::str::FromStr;

/// The wildcard that matches any type or any category.
pub const ALL: &str = "ALL";

/// A `type@category` pair, either half possibly the wildcard [`ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FullType {
    pub kind: String,
    pub category: String,
}

impl FullType {
    pub fn new(kind: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            category: category.into(),
        }
    }

    pub fn all() -> Self {
        Self::new(ALL, ALL)
    }

    /// Whether `self` (typically a rule's declared type) matches `other`
    /// (typically a component's concrete type), honoring `ALL` on
    /// either side of either operand.
    pub fn matches(&self, other: &FullType) -> bool {
        Self::half_matches(&self.kind, &other.kind) && Self::half_matches(&self.category, &other.category)
    }

    fn half_matches(a: &str, b: &str) -> bool {
        a == ALL || b == ALL || a == b
    }
}

impl fmt::Display for FullType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.category)
    }
}

impl FromStr for FullType {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let idx = s.rfind('@').ok_or_else(|| {
            SequencerError::InternalError(format!("malformed FullType (missing '@'): {s}"))
        })?;
        let (kind, category) = s.split_at(idx);
        let category = &category[1..];
        if kind.is_empty() || category.is_empty() {
            return Err(SequencerError::InternalError(format!(
                "malformed FullType (empty half): {s}"
            )));
        }
        Ok(FullType::new(kind, category))
    }
}

/// Identity `name#type@category`. A component is also a substitution
/// environment exposing `%id, %name, %type, %category` (rule-scoped
/// variables `%ruleset, %rulename, %help` are added by the rule that is
/// currently applying, see [`crate::rule::Rule::env_for`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: String,
    pub category: String,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            category: category.into(),
        }
    }

    /// Canonical identifier `name#type@category`.
    pub fn id(&self) -> String {
        format!("{}#{}@{}", self.name, self.kind, self.category)
    }

    pub fn full_type(&self) -> FullType {
        FullType::new(self.kind.clone(), self.category.clone())
    }

    /// The component-only substitution bindings, in the stable order the
    /// source lists them: `%id, %name, %type, %category`.
    pub fn bindings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("%id", self.id()),
            ("%name", self.name.clone()),
            ("%type", self.kind.clone()),
            ("%category", self.category.clone()),
        ]
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for Component {
    type Err = SequencerError;

    /// Parsing: rightmost `@` separates category; rightmost `#` *before*
    /// that separates name from type. Both `name` and `type` must be
    /// non-empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let at = s
            .rfind('@')
            .ok_or_else(|| SequencerError::InternalError(format!("malformed component id: {s}")))?;
        let category = &s[at + 1..];
        let head = &s[..at];
        let hash = head
            .rfind('#')
            .ok_or_else(|| SequencerError::InternalError(format!("malformed component id: {s}")))?;
        let name = &head[..hash];
        let kind = &head[hash + 1..];
        if name.is_empty() || kind.is_empty() || category.is_empty() {
            return Err(SequencerError::InternalError(format!(
                "malformed component id (empty part): {s}"
            )));
        }
        Ok(Component::new(name, kind, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_component_id() {
        let c: Component = "a#t@c".parse().unwrap();
        assert_eq!(c.name, "a");
        assert_eq!(c.kind, "t");
        assert_eq!(c.category, "c");
        assert_eq!(c.id(), "a#t@c");
    }

    #[test]
    fn rejects_malformed_component_id() {
        assert!("a@c".parse::<Component>().is_err());
        assert!("a#t".parse::<Component>().is_err());
    }

    #[test]
    fn full_type_wildcard_matches() {
        let any = FullType::all();
        let concrete = FullType::new("node", "compute");
        assert!(any.matches(&concrete));
        assert!(concrete.matches(&any));
        assert!(!FullType::new("node", "compute").matches(&FullType::new("node", "storage")));
    }
}
