use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a node among its same-named siblings.
///
/// Concrete indexes are **0-indexed**. `Wildcard` is only meaningful in dependency keys and
/// binding paths; it never addresses live data. `Template` addresses the prototype subtree a
/// repeat clones new instances from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Multiplicity {
    Index(usize),
    Wildcard,
    Template,
}

impl Multiplicity {
    #[inline]
    pub const fn index(self) -> Option<usize> {
        match self {
            Multiplicity::Index(i) => Some(i),
            _ => None,
        }
    }

    /// `Wildcard` on either side matches anything; otherwise the values must be equal.
    #[inline]
    pub fn matches(self, other: Multiplicity) -> bool {
        self == Multiplicity::Wildcard || other == Multiplicity::Wildcard || self == other
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Multiplicity::Index(0)
    }
}

/// A single `(name, multiplicity)` step of a [`TreeReference`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefStep {
    pub name: String,
    pub multiplicity: Multiplicity,
}

impl RefStep {
    pub fn new(name: impl Into<String>, multiplicity: Multiplicity) -> Self {
        Self {
            name: name.into(),
            multiplicity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceParseError {
    #[error("empty reference")]
    Empty,
    #[error("empty step in reference `{0}`")]
    EmptyStep(String),
    #[error("invalid multiplicity `{0}`")]
    InvalidMultiplicity(String),
    #[error("`..` may only appear at the start of a relative reference")]
    UnexpectedParentStep,
}

/// A path-based address into the instance tree or a binding in the form definition.
///
/// Absolute references start at the (unnamed) instance root. Relative references climb
/// `parent_levels` steps from the context they are resolved against before descending.
///
/// Text syntax: `/data/rep[2]/q`, `../sibling`, `.`. A bare step name means multiplicity `0`;
/// `[*]` is a wildcard and `[@template]` the repeat template.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeReference {
    /// `None` for absolute references.
    parent_levels: Option<usize>,
    steps: Vec<RefStep>,
}

impl TreeReference {
    /// The absolute reference to the instance root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            parent_levels: None,
            steps: Vec::new(),
        }
    }

    /// A relative reference that climbs `parent_levels` steps and has no steps of its own.
    #[must_use]
    pub const fn relative(parent_levels: usize) -> Self {
        Self {
            parent_levels: Some(parent_levels),
            steps: Vec::new(),
        }
    }

    /// Convenience for tests and static tables: panics on malformed input.
    #[track_caller]
    #[must_use]
    pub fn path(text: &str) -> Self {
        match text.parse() {
            Ok(r) => r,
            Err(err) => panic!("invalid tree reference `{text}`: {err}"),
        }
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.parent_levels.is_none()
    }

    #[inline]
    pub fn parent_levels(&self) -> Option<usize> {
        self.parent_levels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[inline]
    pub fn steps(&self) -> &[RefStep] {
        &self.steps
    }

    pub fn name(&self, level: usize) -> Option<&str> {
        self.steps.get(level).map(|s| s.name.as_str())
    }

    pub fn multiplicity(&self, level: usize) -> Option<Multiplicity> {
        self.steps.get(level).map(|s| s.multiplicity)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.steps.last().map(|s| s.name.as_str())
    }

    pub fn last_multiplicity(&self) -> Option<Multiplicity> {
        self.steps.last().map(|s| s.multiplicity)
    }

    /// Sets the multiplicity at `level`. Out-of-range levels are ignored.
    pub fn set_multiplicity(&mut self, level: usize, multiplicity: Multiplicity) {
        if let Some(step) = self.steps.get_mut(level) {
            step.multiplicity = multiplicity;
        }
    }

    pub fn push(&mut self, name: impl Into<String>, multiplicity: Multiplicity) {
        self.steps.push(RefStep::new(name, multiplicity));
    }

    #[must_use]
    pub fn child(&self, name: impl Into<String>, multiplicity: Multiplicity) -> Self {
        let mut out = self.clone();
        out.push(name, multiplicity);
        out
    }

    /// Returns the reference one level up, or `None` for the absolute root.
    #[must_use]
    pub fn parent_ref(&self) -> Option<Self> {
        let mut out = self.clone();
        if out.steps.pop().is_some() {
            return Some(out);
        }
        match out.parent_levels {
            None => None,
            Some(levels) => {
                out.parent_levels = Some(levels + 1);
                Some(out)
            }
        }
    }

    /// Returns the same path with every multiplicity replaced by [`Multiplicity::Wildcard`].
    ///
    /// Generic references are the keys of the dependency index.
    #[must_use]
    pub fn genericize(&self) -> Self {
        Self {
            parent_levels: self.parent_levels,
            steps: self
                .steps
                .iter()
                .map(|s| RefStep::new(s.name.clone(), Multiplicity::Wildcard))
                .collect(),
        }
    }

    /// `true` if every step carries a concrete index or the template sentinel.
    pub fn is_concrete(&self) -> bool {
        self.is_absolute()
            && self
                .steps
                .iter()
                .all(|s| s.multiplicity != Multiplicity::Wildcard)
    }

    /// `true` if `self` is a prefix of `other` (names equal, multiplicities wildcard-compatible).
    ///
    /// With `proper` set, `self` must also be strictly shorter.
    pub fn is_parent_of(&self, other: &TreeReference, proper: bool) -> bool {
        if self.parent_levels != other.parent_levels {
            return false;
        }
        if self.len() > other.len() || (proper && self.len() == other.len()) {
            return false;
        }
        self.steps
            .iter()
            .zip(&other.steps)
            .all(|(a, b)| a.name == b.name && a.multiplicity.matches(b.multiplicity))
    }

    /// Resolves `self` against an absolute `context`.
    ///
    /// Relative references are anchored at `context`; afterwards every wildcard step that
    /// shares its name (and all preceding names) with `context` takes the context's
    /// multiplicity. Returns `None` if `context` is relative or the reference climbs above
    /// the root.
    #[must_use]
    pub fn contextualize(&self, context: &TreeReference) -> Option<Self> {
        if !context.is_absolute() {
            return None;
        }

        let mut out = match self.parent_levels {
            None => self.clone(),
            Some(levels) => {
                if levels > context.len() {
                    return None;
                }
                let mut steps = context.steps[..context.len() - levels].to_vec();
                steps.extend(self.steps.iter().cloned());
                Self {
                    parent_levels: None,
                    steps,
                }
            }
        };

        for (step, ctx) in out.steps.iter_mut().zip(&context.steps) {
            if step.name != ctx.name {
                break;
            }
            if step.multiplicity == Multiplicity::Wildcard {
                step.multiplicity = ctx.multiplicity;
            }
        }

        Some(out)
    }
}

impl Default for TreeReference {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RefStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        match self.multiplicity {
            Multiplicity::Index(0) => Ok(()),
            Multiplicity::Index(i) => write!(f, "[{i}]"),
            Multiplicity::Wildcard => f.write_str("[*]"),
            Multiplicity::Template => f.write_str("[@template]"),
        }
    }
}

impl fmt::Display for TreeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_levels {
            None => {
                if self.steps.is_empty() {
                    return f.write_str("/");
                }
                for step in &self.steps {
                    write!(f, "/{step}")?;
                }
                Ok(())
            }
            Some(levels) => {
                if levels == 0 && self.steps.is_empty() {
                    return f.write_str(".");
                }
                let mut first = true;
                for _ in 0..levels {
                    if !first {
                        f.write_str("/")?;
                    }
                    f.write_str("..")?;
                    first = false;
                }
                for step in &self.steps {
                    if !first {
                        f.write_str("/")?;
                    }
                    write!(f, "{step}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

fn parse_step(text: &str, whole: &str) -> Result<RefStep, ReferenceParseError> {
    let (name, multiplicity) = match text.find('[') {
        None => (text, Multiplicity::Index(0)),
        Some(open) => {
            let Some(inner) = text[open + 1..].strip_suffix(']') else {
                return Err(ReferenceParseError::InvalidMultiplicity(text.to_string()));
            };
            let multiplicity = match inner {
                "*" => Multiplicity::Wildcard,
                "@template" => Multiplicity::Template,
                digits => digits
                    .parse::<usize>()
                    .map(Multiplicity::Index)
                    .map_err(|_| ReferenceParseError::InvalidMultiplicity(digits.to_string()))?,
            };
            (&text[..open], multiplicity)
        }
    };
    if name.is_empty() {
        return Err(ReferenceParseError::EmptyStep(whole.to_string()));
    }
    Ok(RefStep::new(name, multiplicity))
}

impl FromStr for TreeReference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ReferenceParseError::Empty);
        }

        if let Some(rest) = s.strip_prefix('/') {
            let mut out = TreeReference::root();
            if rest.is_empty() {
                return Ok(out);
            }
            for part in rest.split('/') {
                if part == ".." || part == "." {
                    return Err(ReferenceParseError::UnexpectedParentStep);
                }
                out.steps.push(parse_step(part, s)?);
            }
            return Ok(out);
        }

        let mut levels = 0usize;
        let mut steps = Vec::new();
        for part in s.split('/') {
            match part {
                "." if steps.is_empty() => {}
                ".." if steps.is_empty() => levels += 1,
                "." | ".." => return Err(ReferenceParseError::UnexpectedParentStep),
                _ => steps.push(parse_step(part, s)?),
            }
        }
        Ok(Self {
            parent_levels: Some(levels),
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_absolute_paths() {
        let r = TreeReference::path("/data/rep[2]/q");
        assert!(r.is_absolute());
        assert_eq!(r.len(), 3);
        assert_eq!(r.multiplicity(0), Some(Multiplicity::Index(0)));
        assert_eq!(r.multiplicity(1), Some(Multiplicity::Index(2)));
        assert_eq!(r.to_string(), "/data/rep[2]/q");

        let t = TreeReference::path("/data/rep[@template]/q[*]");
        assert_eq!(t.multiplicity(1), Some(Multiplicity::Template));
        assert_eq!(t.multiplicity(2), Some(Multiplicity::Wildcard));
        assert_eq!(t.to_string(), "/data/rep[@template]/q[*]");
        assert_eq!(TreeReference::path("/").to_string(), "/");
    }

    #[test]
    fn parses_relative_paths() {
        let r = TreeReference::path("../../a/b");
        assert_eq!(r.parent_levels(), Some(2));
        assert_eq!(r.len(), 2);
        assert_eq!(r.to_string(), "../../a/b");
        assert_eq!(TreeReference::path(".").to_string(), ".");
        assert_eq!(TreeReference::path("..").to_string(), "..");
        assert_eq!(
            "a/../b".parse::<TreeReference>(),
            Err(ReferenceParseError::UnexpectedParentStep)
        );
        assert_eq!(
            "/a/b[x]".parse::<TreeReference>(),
            Err(ReferenceParseError::InvalidMultiplicity("x".into()))
        );
    }

    #[test]
    fn genericize_replaces_every_multiplicity() {
        let r = TreeReference::path("/data/rep[3]/q[@template]").genericize();
        assert!(r
            .steps()
            .iter()
            .all(|s| s.multiplicity == Multiplicity::Wildcard));
        assert!(!r.is_concrete());
    }

    #[test]
    fn parent_of_honours_wildcards() {
        let generic = TreeReference::path("/data/rep").genericize();
        assert!(generic.is_parent_of(&TreeReference::path("/data/rep[4]/q"), true));
        assert!(generic.is_parent_of(&TreeReference::path("/data/rep[4]"), false));
        assert!(!generic.is_parent_of(&TreeReference::path("/data/rep[4]"), true));
        assert!(!TreeReference::path("/data/rep[1]")
            .is_parent_of(&TreeReference::path("/data/rep[2]/q"), false));
        assert!(TreeReference::root().is_parent_of(&generic, false));
    }

    #[test]
    fn contextualize_fills_matching_prefix() {
        let context = TreeReference::path("/data/rep[2]/a");
        let generic = TreeReference::path("/data/rep/q").genericize();
        let out = generic.contextualize(&context).unwrap();
        assert_eq!(out.to_string(), "/data/rep[2]/q[*]");

        let relative = TreeReference::path("../b");
        assert_eq!(
            relative.contextualize(&context).unwrap().to_string(),
            "/data/rep[2]/b"
        );
        assert_eq!(
            TreeReference::path(".").contextualize(&context).unwrap(),
            context
        );
        assert_eq!(TreeReference::path("../../../../x").contextualize(&context), None);
    }

    #[test]
    fn parent_ref_walks_up() {
        let r = TreeReference::path("/data/q");
        assert_eq!(r.parent_ref().unwrap().to_string(), "/data");
        assert_eq!(TreeReference::root().parent_ref(), None);
        assert_eq!(
            TreeReference::path(".").parent_ref().unwrap().to_string(),
            ".."
        );
    }
}
