//! Semver versions and npm-style version ranges.
//!
//! Ranges follow the grammar package manifests use:
//!
//! ```text
//! range      ::= set ( '||' set )*
//! set        ::= hyphen | simple ( ' ' simple )* | ''
//! hyphen     ::= partial ' - ' partial
//! simple     ::= ( '^' | '~' | '~>' | '<' | '<=' | '>' | '>=' | '=' | 'v' )? partial
//! partial    ::= xr ( '.' xr ( '.' xr pre? build? )? )?
//! xr         ::= 'x' | 'X' | '*' | number
//! ```
//!
//! `VersionRange` renders back to a canonical string with
//! `parse_range(&r.to_string()) == r` for every range the parser accepts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{Prerelease, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A version or range string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {what} `{input}`: {reason}")]
pub struct ParseError {
    pub what: &'static str,
    pub input: String,
    pub reason: String,
}

impl ParseError {
    fn version(input: &str, reason: impl Into<String>) -> Self {
        ParseError {
            what: "version",
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    fn range(input: &str, reason: impl Into<String>) -> Self {
        ParseError {
            what: "version range",
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a concrete version. A leading `v` or `=` is accepted.
pub fn parse_version(s: &str) -> Result<Version, ParseError> {
    let trimmed = s.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed)
        .trim();

    Version::parse(stripped).map_err(|e| ParseError::version(s, e.to_string()))
}

/// Parse a version range.
pub fn parse_range(s: &str) -> Result<VersionRange, ParseError> {
    s.parse()
}

/// Check whether `version` satisfies `range`.
pub fn satisfies(version: &Version, range: &VersionRange) -> bool {
    range.matches(version)
}

/// Canonical string for a range.
pub fn range_to_string(range: &VersionRange) -> String {
    range.to_string()
}

/// Whether `a` has strictly higher precedence than `b`.
///
/// Build metadata is ignored, so `1.0.0+a` is not higher than `1.0.0+b`.
pub fn is_higher(a: &Version, b: &Version) -> bool {
    precedence(a, b) == Ordering::Greater
}

/// Semver precedence ordering (build metadata ignored).
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// A partially specified version. Missing components act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub pre: Prerelease,
}

impl Partial {
    fn any() -> Self {
        Partial {
            major: None,
            minor: None,
            patch: None,
            pre: Prerelease::EMPTY,
        }
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// The lowest version this partial can describe.
    fn floor(&self) -> Version {
        let mut v = Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        );
        v.pre = self.pre.clone();
        v
    }

    /// The first version past everything this partial describes, if it is partial.
    fn ceiling(&self) -> Option<Version> {
        match (self.major, self.minor, self.patch) {
            (Some(major), None, _) => Some(Version::new(major + 1, 0, 0)),
            (Some(major), Some(minor), None) => Some(Version::new(major, minor + 1, 0)),
            _ => None,
        }
    }
}

impl fmt::Display for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(major) = self.major else {
            return write!(f, "*");
        };
        write!(f, "{}", major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
            if let Some(patch) = self.patch {
                write!(f, ".{}", patch)?;
                if !self.pre.is_empty() {
                    write!(f, "-{}", self.pre)?;
                }
            }
        }
        Ok(())
    }
}

/// Comparator operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `1.2.3`, `=1.2.3`, `1.2.x`
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Tilde,
    Caret,
}

impl Op {
    fn prefix(self) -> &'static str {
        match self {
            Op::Exact => "",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub partial: Partial,
}

/// Bound on one side of an interval: `(version, inclusive)`.
type Bound = Option<(Version, bool)>;

impl Comparator {
    fn bounds(&self) -> (Bound, Bound) {
        let p = &self.partial;
        if p.major.is_none() {
            return match self.op {
                // `<*` and `>*` match nothing
                Op::Less | Op::Greater => (None, Some((Version::new(0, 0, 0), false))),
                _ => (None, None),
            };
        }

        let floor = p.floor();
        let major = p.major.unwrap_or(0);
        let minor = p.minor.unwrap_or(0);
        let patch = p.patch.unwrap_or(0);

        match self.op {
            Op::Exact => match p.ceiling() {
                Some(ceiling) => (Some((floor, true)), Some((ceiling, false))),
                None => (Some((floor.clone(), true)), Some((floor, true))),
            },
            Op::GreaterEq => (Some((floor, true)), None),
            Op::Greater => match p.ceiling() {
                Some(ceiling) => (Some((ceiling, true)), None),
                None => (Some((floor, false)), None),
            },
            Op::Less => (None, Some((floor, false))),
            Op::LessEq => match p.ceiling() {
                Some(ceiling) => (None, Some((ceiling, false))),
                None => (None, Some((floor, true))),
            },
            Op::Tilde => {
                let upper = if p.minor.is_some() {
                    Version::new(major, minor + 1, 0)
                } else {
                    Version::new(major + 1, 0, 0)
                };
                (Some((floor, true)), Some((upper, false)))
            }
            Op::Caret => {
                let upper = if major > 0 || p.minor.is_none() {
                    Version::new(major + 1, 0, 0)
                } else if minor > 0 || p.patch.is_none() {
                    Version::new(0, minor + 1, 0)
                } else {
                    Version::new(0, 0, patch + 1)
                };
                (Some((floor, true)), Some((upper, false)))
            }
        }
    }

    fn matches(&self, version: &Version) -> bool {
        let (lower, upper) = self.bounds();
        let above = match &lower {
            None => true,
            Some((bound, true)) => precedence(version, bound) != Ordering::Less,
            Some((bound, false)) => precedence(version, bound) == Ordering::Greater,
        };
        let below = match &upper {
            None => true,
            Some((bound, true)) => precedence(version, bound) != Ordering::Greater,
            Some((bound, false)) => precedence(version, bound) == Ordering::Less,
        };
        above && below
    }

    /// Whether this comparator opts a prerelease of the same patch into matching.
    fn admits_prerelease_of(&self, version: &Version) -> bool {
        !self.partial.pre.is_empty()
            && self.partial.major == Some(version.major)
            && self.partial.minor == Some(version.minor)
            && self.partial.patch == Some(version.patch)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Op::Exact && !self.partial.is_full() {
            // x-range: `1.x`, `1.2.x`, `*`
            return match (self.partial.major, self.partial.minor) {
                (None, _) => write!(f, "*"),
                (Some(major), None) => write!(f, "{}.x", major),
                (Some(major), Some(minor)) => write!(f, "{}.{}.x", major, minor),
            };
        }
        write!(f, "{}{}", self.op.prefix(), self.partial)
    }
}

/// A version range: a disjunction of comparator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    sets: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// The range matching every release version.
    pub fn any() -> Self {
        VersionRange {
            sets: vec![vec![Comparator {
                op: Op::Exact,
                partial: Partial::any(),
            }]],
        }
    }

    /// Check whether a version satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| {
            if !set.iter().all(|c| c.matches(version)) {
                return false;
            }
            version.pre.is_empty() || set.iter().any(|c| c.admits_prerelease_of(version))
        })
    }

    /// The comparator sets, in source order.
    pub fn sets(&self) -> &[Vec<Comparator>] {
        &self.sets
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, set) in self.sets.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            for (j, comparator) in set.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", comparator)?;
            }
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sets = s
            .split("||")
            .map(|set| parse_set(s, set.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VersionRange { sets })
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_set(input: &str, set: &str) -> Result<Vec<Comparator>, ParseError> {
    if set.is_empty() {
        return Ok(VersionRange::any().sets.remove(0));
    }

    if let Some((from, to)) = set.split_once(" - ") {
        let from = parse_partial(input, from.trim())?;
        let to = parse_partial(input, to.trim())?;
        return Ok(vec![
            Comparator {
                op: Op::GreaterEq,
                partial: from,
            },
            Comparator {
                op: Op::LessEq,
                partial: to,
            },
        ]);
    }

    let tokens = join_operator_tokens(set);
    tokens
        .iter()
        .map(|token| parse_simple(input, token))
        .collect()
}

/// Split a set on whitespace, gluing a bare operator to the version after it
/// (`>= 1.2.3` is one comparator).
fn join_operator_tokens(set: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;

    for word in set.split_whitespace() {
        let is_bare_op = matches!(word, "^" | "~" | "~>" | "<" | "<=" | ">" | ">=" | "=" | "v");
        match pending.take() {
            Some(op) => tokens.push(format!("{}{}", op, word)),
            None if is_bare_op => pending = Some(word.to_string()),
            None => tokens.push(word.to_string()),
        }
    }
    if let Some(op) = pending {
        tokens.push(op);
    }
    tokens
}

fn parse_simple(input: &str, token: &str) -> Result<Comparator, ParseError> {
    const PREFIXES: [(&str, Op); 9] = [
        ("~>", Op::Tilde),
        (">=", Op::GreaterEq),
        ("<=", Op::LessEq),
        (">", Op::Greater),
        ("<", Op::Less),
        ("^", Op::Caret),
        ("~", Op::Tilde),
        ("=", Op::Exact),
        ("v", Op::Exact),
    ];

    let (op, rest) = PREFIXES
        .iter()
        .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((Op::Exact, token));

    let rest = rest.trim_start_matches('v');
    if rest.is_empty() {
        return Err(ParseError::range(input, format!("missing version after `{}`", token)));
    }

    Ok(Comparator {
        op,
        partial: parse_partial(input, rest)?,
    })
}

fn parse_partial(input: &str, s: &str) -> Result<Partial, ParseError> {
    let s = s.trim_start_matches(['v', '=']);
    let without_build = s.split_once('+').map_or(s, |(head, _)| head);
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let mut parts = [None, None, None];
    let components: Vec<&str> = core.split('.').collect();
    if components.len() > 3 {
        return Err(ParseError::range(input, format!("too many components in `{}`", s)));
    }

    let mut wildcard_seen = false;
    for (slot, component) in parts.iter_mut().zip(&components) {
        if matches!(*component, "x" | "X" | "*") {
            wildcard_seen = true;
            continue;
        }
        if wildcard_seen {
            return Err(ParseError::range(
                input,
                format!("number after wildcard in `{}`", s),
            ));
        }
        let number = component.parse::<u64>().map_err(|_| {
            ParseError::range(input, format!("`{}` is not a version component", component))
        })?;
        *slot = Some(number);
    }

    let pre = match pre {
        Some(pre) if parts[2].is_some() => Prerelease::new(pre)
            .map_err(|e| ParseError::range(input, e.to_string()))?,
        Some(_) => {
            return Err(ParseError::range(
                input,
                format!("prerelease on incomplete version `{}`", s),
            ))
        }
        None => Prerelease::EMPTY,
    };

    Ok(Partial {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
        pre,
    })
}

/// Whether a string looks like a version requirement rather than a request.
pub fn looks_like_version_requirement(s: &str) -> bool {
    let s = s.trim();
    matches!(s, "*" | "x" | "X")
        || s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '^' | '=' | 'v' | '<' | '>' | '~'))
}
