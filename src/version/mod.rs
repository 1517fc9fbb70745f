// src/version/mod.rs

//! OSGi versions and version ranges
//!
//! A [`Version`] has the form `major.minor.micro.qualifier`. Missing numeric
//! segments default to zero and the qualifier defaults to empty. Versions
//! order numerically on the three numbers, then lexically on the qualifier.
//!
//! A [`VersionRange`] uses OSGi interval notation:
//! - `[1.0,2.0)` includes 1.0, excludes 2.0
//! - `(1.0,2.0]` excludes 1.0, includes 2.0
//! - `1.0` (a bare version) means "1.0 or later"
//!
//! The literal qualifier `qualifier` is a build-time placeholder; matching a
//! version that carries it ignores the qualifier entirely (see
//! [`Version::matches_ignoring_wildcard`]).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default wildcard qualifier used by reactor builds
pub const WILDCARD_QUALIFIER: &str = "qualifier";

/// Errors from parsing versions and ranges
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("'{0}' has more than four segments")]
    TooManySegments(String),
    #[error("invalid numeric segment '{segment}' in '{input}'")]
    InvalidNumber { input: String, segment: String },
    #[error("invalid qualifier '{qualifier}' in '{input}'")]
    InvalidQualifier { input: String, qualifier: String },
    #[error("malformed version range '{0}'")]
    MalformedRange(String),
    #[error("empty version range '{0}'")]
    EmptyRange(String),
}

/// An OSGi version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    /// The empty version `0.0.0`
    pub const EMPTY: Version = Version {
        major: 0,
        minor: 0,
        micro: 0,
        qualifier: String::new(),
    };

    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: qualifier.into(),
        }
    }

    /// Parse a version string
    ///
    /// An empty (or blank) string parses as [`Version::EMPTY`].
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let input = s.trim();
        if input.is_empty() {
            return Ok(Self::EMPTY);
        }

        let parts: Vec<&str> = input.splitn(4, '.').collect();
        let number = |segment: &str| -> Result<u32, VersionParseError> {
            segment.parse::<u32>().map_err(|_| VersionParseError::InvalidNumber {
                input: input.to_string(),
                segment: segment.to_string(),
            })
        };

        let major = number(parts[0])?;
        let minor = parts.get(1).map(|s| number(s)).transpose()?.unwrap_or(0);
        let micro = parts.get(2).map(|s| number(s)).transpose()?.unwrap_or(0);
        let qualifier = parts.get(3).copied().unwrap_or("");

        if qualifier.contains('.') {
            return Err(VersionParseError::TooManySegments(input.to_string()));
        }
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VersionParseError::InvalidQualifier {
                input: input.to_string(),
                qualifier: qualifier.to_string(),
            });
        }

        Ok(Self {
            major,
            minor,
            micro,
            qualifier: qualifier.to_string(),
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// The version without its qualifier
    pub fn base(&self) -> Version {
        Version::new(self.major, self.minor, self.micro)
    }

    /// True if the qualifier is the given wildcard literal
    pub fn has_wildcard_qualifier(&self, wildcard: &str) -> bool {
        self.qualifier == wildcard
    }

    /// Match `other` against this version, treating a wildcard qualifier as "any"
    ///
    /// - wildcard qualifier: compare major.minor.micro only
    /// - anything else: exact full-version equality
    pub fn matches_ignoring_wildcard(&self, other: &Version, wildcard: &str) -> bool {
        if self.has_wildcard_qualifier(wildcard) {
            self.base() == other.base()
        } else {
            self == other
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Version::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// An OSGi version range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    minimum: Version,
    include_minimum: bool,
    /// None means unbounded
    maximum: Option<Version>,
    include_maximum: bool,
}

impl VersionRange {
    /// The range matching every version (`0.0.0` or later)
    pub const ANY: VersionRange = VersionRange {
        minimum: Version::EMPTY,
        include_minimum: true,
        maximum: None,
        include_maximum: false,
    };

    pub fn new(minimum: Version, include_minimum: bool, maximum: Option<Version>, include_maximum: bool) -> Self {
        Self {
            minimum,
            include_minimum,
            maximum,
            include_maximum,
        }
    }

    /// `[v,v]`
    pub fn exact(version: Version) -> Self {
        Self {
            minimum: version.clone(),
            include_minimum: true,
            maximum: Some(version),
            include_maximum: true,
        }
    }

    /// `[v,∞)`
    pub fn at_least(version: Version) -> Self {
        Self {
            minimum: version,
            include_minimum: true,
            maximum: None,
            include_maximum: false,
        }
    }

    /// Range for a version whose qualifier may be the build wildcard
    ///
    /// A wildcard qualifier turns `1.2.3.qualifier` into `[1.2.3,1.2.4)`;
    /// any other version becomes an exact range.
    pub fn from_wildcard(version: &Version, wildcard: &str) -> Self {
        if version.has_wildcard_qualifier(wildcard) {
            let base = version.base();
            let next = Version::new(base.major, base.minor, base.micro.saturating_add(1));
            Self::new(base, true, Some(next), false)
        } else {
            Self::exact(version.clone())
        }
    }

    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let input = s.trim();
        if input.is_empty() {
            return Ok(Self::ANY);
        }

        let first = input.chars().next();
        if !matches!(first, Some('[') | Some('(')) {
            return Ok(Self::at_least(Version::parse(input)?));
        }

        let last = input.chars().last();
        if !matches!(last, Some(']') | Some(')')) || input.len() < 2 {
            return Err(VersionParseError::MalformedRange(input.to_string()));
        }

        let body = &input[1..input.len() - 1];
        let (low, high) = body
            .split_once(',')
            .ok_or_else(|| VersionParseError::MalformedRange(input.to_string()))?;

        let range = Self {
            minimum: Version::parse(low)?,
            include_minimum: first == Some('['),
            maximum: Some(Version::parse(high)?),
            include_maximum: last == Some(']'),
        };

        if range.is_empty() {
            return Err(VersionParseError::EmptyRange(input.to_string()));
        }
        Ok(range)
    }

    pub fn minimum(&self) -> &Version {
        &self.minimum
    }

    pub fn maximum(&self) -> Option<&Version> {
        self.maximum.as_ref()
    }

    pub fn include_minimum(&self) -> bool {
        self.include_minimum
    }

    pub fn include_maximum(&self) -> bool {
        self.include_maximum
    }

    /// True for `[v,v]` ranges
    pub fn is_exact(&self) -> bool {
        self.include_minimum
            && self.include_maximum
            && self.maximum.as_ref() == Some(&self.minimum)
    }

    fn is_empty(&self) -> bool {
        match &self.maximum {
            None => false,
            Some(max) => match self.minimum.cmp(max) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.include_minimum && self.include_maximum),
                Ordering::Less => false,
            },
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        let above_min = match version.cmp(&self.minimum) {
            Ordering::Greater => true,
            Ordering::Equal => self.include_minimum,
            Ordering::Less => false,
        };
        if !above_min {
            return false;
        }
        match &self.maximum {
            None => true,
            Some(max) => match version.cmp(max) {
                Ordering::Less => true,
                Ordering::Equal => self.include_maximum,
                Ordering::Greater => false,
            },
        }
    }

    /// True if both ranges include at least one common version
    pub fn intersects(&self, other: &VersionRange) -> bool {
        let (low, low_inclusive) = match self.minimum.cmp(&other.minimum) {
            Ordering::Greater => (&self.minimum, self.include_minimum),
            Ordering::Less => (&other.minimum, other.include_minimum),
            Ordering::Equal => (&self.minimum, self.include_minimum && other.include_minimum),
        };
        let high = match (&self.maximum, &other.maximum) {
            (None, None) => None,
            (Some(a), None) => Some((a, self.include_maximum)),
            (None, Some(b)) => Some((b, other.include_maximum)),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => Some((a, self.include_maximum)),
                Ordering::Greater => Some((b, other.include_maximum)),
                Ordering::Equal => Some((a, self.include_maximum && other.include_maximum)),
            },
        };
        match high {
            None => true,
            Some((high, high_inclusive)) => match low.cmp(high) {
                Ordering::Less => true,
                Ordering::Equal => low_inclusive && high_inclusive,
                Ordering::Greater => false,
            },
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::ANY
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.maximum {
            None if self.include_minimum => write!(f, "{}", self.minimum),
            None => write!(f, "({},)", self.minimum),
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.include_minimum { '[' } else { '(' },
                self.minimum,
                max,
                if self.include_maximum { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        VersionRange::parse(&s)
    }
}

impl From<VersionRange> for String {
    fn from(r: VersionRange) -> Self {
        r.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        let v = Version::parse("1.2.3.v2024").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.micro(), 3);
        assert_eq!(v.qualifier(), "v2024");

        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse("1.8").unwrap(), Version::new(1, 8, 0));
        assert_eq!(Version::parse("").unwrap(), Version::EMPTY);
        assert_eq!(Version::parse(" 2.0 ").unwrap().to_string(), "2.0.0");
    }

    #[test]
    fn test_parse_invalid_versions() {
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.-2").is_err());
        assert!(Version::parse("1.0.0.q.x").is_err());
        assert!(Version::parse("1.0.0.q!").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let a = Version::parse("1.0.0").unwrap();
        let b = Version::parse("1.0.0.a").unwrap();
        let c = Version::parse("1.0.1").unwrap();
        let d = Version::parse("1.10.0").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
    }

    #[test]
    fn test_wildcard_matching() {
        let wildcard = Version::parse("1.2.3.qualifier").unwrap();
        let built = Version::parse("1.2.3.v20240101").unwrap();
        let other = Version::parse("1.2.4.v20240101").unwrap();
        assert!(wildcard.matches_ignoring_wildcard(&built, WILDCARD_QUALIFIER));
        assert!(!wildcard.matches_ignoring_wildcard(&other, WILDCARD_QUALIFIER));

        // explicit qualifier is exact
        let exact = Version::parse("1.2.3.v1").unwrap();
        assert!(!exact.matches_ignoring_wildcard(&built, WILDCARD_QUALIFIER));

        // absent qualifier is exact too
        let plain = Version::parse("1.2.3").unwrap();
        assert!(!plain.matches_ignoring_wildcard(&built, WILDCARD_QUALIFIER));
        assert!(plain.matches_ignoring_wildcard(&Version::new(1, 2, 3), WILDCARD_QUALIFIER));
    }

    #[test]
    fn test_parse_ranges() {
        let r = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(r.includes(&Version::new(1, 0, 0)));
        assert!(r.includes(&Version::parse("1.5.0").unwrap()));
        assert!(!r.includes(&Version::new(2, 0, 0)));
        assert_eq!(r.to_string(), "[1.0.0,2.0.0)");

        let r = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!r.includes(&Version::new(1, 0, 0)));
        assert!(r.includes(&Version::new(2, 0, 0)));

        let r = VersionRange::parse("1.5").unwrap();
        assert!(r.includes(&Version::new(7, 0, 0)));
        assert!(!r.includes(&Version::new(1, 4, 9)));
        assert_eq!(r.to_string(), "1.5.0");

        assert_eq!(VersionRange::parse("").unwrap(), VersionRange::ANY);
    }

    #[test]
    fn test_parse_invalid_ranges() {
        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("[1.0]").is_err());
        assert!(matches!(
            VersionRange::parse("[2.0,1.0]"),
            Err(VersionParseError::EmptyRange(_))
        ));
    }

    #[test]
    fn test_exact_and_wildcard_ranges() {
        let v = Version::parse("3.1.0.v1").unwrap();
        let exact = VersionRange::exact(v.clone());
        assert!(exact.is_exact());
        assert!(exact.includes(&v));
        assert!(!exact.includes(&Version::new(3, 1, 0)));

        let w = Version::parse("3.1.0.qualifier").unwrap();
        let range = VersionRange::from_wildcard(&w, WILDCARD_QUALIFIER);
        assert!(!range.is_exact());
        assert!(range.includes(&v));
        assert!(!range.includes(&Version::new(3, 1, 1)));
    }

    #[test]
    fn test_intersects() {
        let a = VersionRange::parse("[1.0,2.0)").unwrap();
        let b = VersionRange::parse("[1.5,3.0)").unwrap();
        let c = VersionRange::parse("[2.0,3.0)").unwrap();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(VersionRange::ANY.intersects(&c));

        let open_a = VersionRange::parse("(1.0,2.0)").unwrap();
        let open_b = VersionRange::parse("(1.0,3.0)").unwrap();
        assert!(open_a.intersects(&open_b));
    }

    #[test]
    fn test_serde_as_string() {
        let v = Version::parse("1.2.3.q").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.2.3.q\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let r: VersionRange = serde_json::from_str("\"[1.0,2.0)\"").unwrap();
        assert!(r.includes(&Version::new(1, 9, 0)));
    }
}
