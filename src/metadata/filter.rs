// src/metadata/filter.rs

//! LDAP-style filter expressions
//!
//! Installable units and requirements carry filters such as
//! `(&(osgi.os=linux)(osgi.ws=gtk))` that are evaluated against a
//! selection context, and `osgi.ee` requirements match capabilities with
//! filters like `(&(osgi.ee=JavaSE)(version=1.8))`.
//!
//! Supported syntax: `&`, `|`, `!`, `=`, `~=`, `>=`, `<=`, presence
//! (`(key=*)`) and substring patterns (`(key=gtk*)`). Values that parse as
//! OSGi versions on both sides are compared as versions, so `1.8` equals
//! `1.8.0`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("unexpected end of filter '{0}'")]
    UnexpectedEnd(String),
    #[error("expected '{expected}' at position {position} in '{input}'")]
    Expected {
        input: String,
        expected: char,
        position: usize,
    },
    #[error("missing attribute name at position {position} in '{input}'")]
    MissingAttribute { input: String, position: usize },
    #[error("trailing characters in filter '{0}'")]
    TrailingInput(String),
}

/// Lookup of filter attribute values
pub trait PropertyLookup {
    fn property(&self, key: &str) -> Option<&str>;
}

impl PropertyLookup for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl PropertyLookup for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    Approx,
    GreaterEqual,
    LessEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare {
        attribute: String,
        operator: Operator,
        value: String,
    },
    Present(String),
    /// Value split on unescaped `*`; empty first/last parts mean open ends
    Substring { attribute: String, parts: Vec<String> },
}

/// A parsed filter, keeping its source text for messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LdapFilter {
    text: String,
    root: Node,
}

impl PartialEq for LdapFilter {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for LdapFilter {}

impl std::hash::Hash for LdapFilter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl LdapFilter {
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        let text = input.trim().to_string();
        let mut parser = Parser {
            input: &text,
            chars: text.chars().collect(),
            pos: 0,
        };
        let root = parser.filter()?;
        parser.skip_whitespace();
        if parser.pos != parser.chars.len() {
            return Err(FilterParseError::TrailingInput(text.clone()));
        }
        Ok(Self { text, root })
    }

    /// Conjunction of equality tests, e.g. `(&(osgi.os=linux)(osgi.ws=gtk))`
    pub fn all_equal<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Option<Self> {
        let terms: Vec<String> = pairs
            .into_iter()
            .map(|(k, v)| format!("({}={})", k, escape(v)))
            .collect();
        let text = match terms.len() {
            0 => return None,
            1 => terms[0].clone(),
            _ => format!("(&{})", terms.concat()),
        };
        LdapFilter::parse(&text).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches<P: PropertyLookup + ?Sized>(&self, properties: &P) -> bool {
        evaluate(&self.root, properties)
    }

    /// Value of the first equality test on `attribute`, if any
    ///
    /// Used to read names out of requirement filters such as
    /// `(&(osgi.ee=JavaSE)(version=11))`.
    pub fn equality_value(&self, attribute: &str) -> Option<&str> {
        find_equality(&self.root, attribute)
    }
}

fn find_equality<'a>(node: &'a Node, attribute: &str) -> Option<&'a str> {
    match node {
        Node::Compare {
            attribute: a,
            operator: Operator::Equal,
            value,
        } if a == attribute => Some(value.as_str()),
        Node::And(children) => children.iter().find_map(|c| find_equality(c, attribute)),
        _ => None,
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn evaluate<P: PropertyLookup + ?Sized>(node: &Node, properties: &P) -> bool {
    match node {
        Node::And(children) => children.iter().all(|c| evaluate(c, properties)),
        Node::Or(children) => children.iter().any(|c| evaluate(c, properties)),
        Node::Not(child) => !evaluate(child, properties),
        Node::Present(attribute) => properties.property(attribute).is_some(),
        Node::Compare {
            attribute,
            operator,
            value,
        } => match properties.property(attribute) {
            Some(actual) => compare(actual, *operator, value),
            None => false,
        },
        Node::Substring { attribute, parts } => match properties.property(attribute) {
            Some(actual) => substring_match(actual, parts),
            None => false,
        },
    }
}

fn as_version(s: &str) -> Option<Version> {
    if s.trim().starts_with(|c: char| c.is_ascii_digit()) {
        Version::parse(s).ok()
    } else {
        None
    }
}

fn compare(actual: &str, operator: Operator, expected: &str) -> bool {
    let ordering = || match (as_version(actual), as_version(expected)) {
        (Some(a), Some(e)) => a.cmp(&e),
        _ => actual.cmp(expected),
    };
    match operator {
        Operator::Approx => {
            let normalize = |s: &str| -> String {
                s.chars()
                    .filter(|c| !c.is_whitespace())
                    .flat_map(char::to_lowercase)
                    .collect()
            };
            normalize(actual) == normalize(expected)
        }
        Operator::Equal => ordering().is_eq(),
        Operator::GreaterEqual => ordering().is_ge(),
        Operator::LessEqual => ordering().is_le(),
    }
}

fn substring_match(actual: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    if !actual.starts_with(first.as_str()) {
        return false;
    }
    let mut remaining = &actual[first.len()..];
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(idx) => remaining = &remaining[idx + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(FilterParseError::Expected {
                input: self.input.to_string(),
                expected,
                position: self.pos,
            }),
            None => Err(FilterParseError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn filter(&mut self) -> Result<Node, FilterParseError> {
        self.expect('(')?;
        self.skip_whitespace();
        let node = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Node::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Node::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Node::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(FilterParseError::UnexpectedEnd(self.input.to_string())),
        };
        self.expect(')')?;
        Ok(node)
    }

    fn filter_list(&mut self) -> Result<Vec<Node>, FilterParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            nodes.push(self.filter()?);
        }
        Ok(nodes)
    }

    fn item(&mut self) -> Result<Node, FilterParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '>' | '<' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attribute: String = self.chars[start..self.pos].iter().collect::<String>().trim().to_string();
        if attribute.is_empty() {
            return Err(FilterParseError::MissingAttribute {
                input: self.input.to_string(),
                position: start,
            });
        }

        let operator = match self.peek() {
            Some('=') => {
                self.pos += 1;
                Operator::Equal
            }
            Some(c @ ('~' | '>' | '<')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => Operator::Approx,
                    '>' => Operator::GreaterEqual,
                    _ => Operator::LessEqual,
                }
            }
            Some(_) => {
                return Err(FilterParseError::Expected {
                    input: self.input.to_string(),
                    expected: '=',
                    position: self.pos,
                });
            }
            None => return Err(FilterParseError::UnexpectedEnd(self.input.to_string())),
        };

        // value up to the closing paren; '*' splits substring parts unless escaped
        let mut parts = vec![String::new()];
        let mut has_wildcard = false;
        loop {
            match self.peek() {
                None => return Err(FilterParseError::UnexpectedEnd(self.input.to_string())),
                Some(')') => break,
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| FilterParseError::UnexpectedEnd(self.input.to_string()))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                    self.pos += 1;
                }
                Some('*') if operator == Operator::Equal => {
                    has_wildcard = true;
                    parts.push(String::new());
                    self.pos += 1;
                }
                Some(c) => {
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                    self.pos += 1;
                }
            }
        }

        if !has_wildcard {
            let value = parts.pop().unwrap_or_default().trim().to_string();
            return Ok(Node::Compare {
                attribute,
                operator,
                value,
            });
        }
        if parts.len() == 2 && parts.iter().all(String::is_empty) {
            return Ok(Node::Present(attribute));
        }
        Ok(Node::Substring { attribute, parts })
    }
}

impl fmt::Display for LdapFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for LdapFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LdapFilter::parse(s)
    }
}

impl TryFrom<String> for LdapFilter {
    type Error = FilterParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        LdapFilter::parse(&s)
    }
}

impl From<LdapFilter> for String {
    fn from(f: LdapFilter) -> Self {
        f.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_equality() {
        let f = LdapFilter::parse("(osgi.os=linux)").unwrap();
        assert!(f.matches(&props(&[("osgi.os", "linux")])));
        assert!(!f.matches(&props(&[("osgi.os", "win32")])));
        assert!(!f.matches(&props(&[])));
    }

    #[test]
    fn test_composite_filters() {
        let f = LdapFilter::parse("(&(osgi.os=linux)(|(osgi.ws=gtk)(osgi.ws=motif))(!(osgi.arch=ppc)))").unwrap();
        assert!(f.matches(&props(&[("osgi.os", "linux"), ("osgi.ws", "gtk"), ("osgi.arch", "x86_64")])));
        assert!(!f.matches(&props(&[("osgi.os", "linux"), ("osgi.ws", "gtk"), ("osgi.arch", "ppc")])));
        assert!(!f.matches(&props(&[("osgi.os", "linux"), ("osgi.ws", "cocoa")])));
    }

    #[test]
    fn test_version_comparison() {
        let f = LdapFilter::parse("(&(osgi.ee=JavaSE)(version=1.8))").unwrap();
        assert!(f.matches(&props(&[("osgi.ee", "JavaSE"), ("version", "1.8.0")])));
        assert!(!f.matches(&props(&[("osgi.ee", "JavaSE"), ("version", "11.0.0")])));

        let f = LdapFilter::parse("(version>=11)").unwrap();
        assert!(f.matches(&props(&[("version", "17.0.0")])));
        assert!(!f.matches(&props(&[("version", "1.8.0")])));
        assert_eq!(
            LdapFilter::parse("(&(osgi.ee=JavaSE)(version=11))").unwrap().equality_value("osgi.ee"),
            Some("JavaSE")
        );
    }

    #[test]
    fn test_presence_and_substring() {
        let f = LdapFilter::parse("(osgi.ws=*)").unwrap();
        assert!(f.matches(&props(&[("osgi.ws", "gtk")])));
        assert!(!f.matches(&props(&[])));

        let f = LdapFilter::parse("(osgi.arch=x86*)").unwrap();
        assert!(f.matches(&props(&[("osgi.arch", "x86_64")])));
        assert!(f.matches(&props(&[("osgi.arch", "x86")])));
        assert!(!f.matches(&props(&[("osgi.arch", "aarch64")])));

        let f = LdapFilter::parse("(name=*eclipse*swt*)").unwrap();
        assert!(f.matches(&props(&[("name", "org.eclipse.swt.gtk")])));
        assert!(!f.matches(&props(&[("name", "org.eclipse.jface")])));
    }

    #[test]
    fn test_approx() {
        let f = LdapFilter::parse("(osgi.os~=Linux)").unwrap();
        assert!(f.matches(&props(&[("osgi.os", "linux")])));
    }

    #[test]
    fn test_parse_errors() {
        assert!(LdapFilter::parse("osgi.os=linux").is_err());
        assert!(LdapFilter::parse("(osgi.os=linux").is_err());
        assert!(LdapFilter::parse("(=linux)").is_err());
        assert!(LdapFilter::parse("(osgi.os=linux))").is_err());
    }

    #[test]
    fn test_all_equal_builder() {
        let f = LdapFilter::all_equal([("osgi.os", "linux"), ("osgi.ws", "gtk")]).unwrap();
        assert_eq!(f.as_str(), "(&(osgi.os=linux)(osgi.ws=gtk))");
        let single = LdapFilter::all_equal([("osgi.os", "win32")]).unwrap();
        assert_eq!(single.as_str(), "(osgi.os=win32)");
        assert!(LdapFilter::all_equal(Vec::<(&str, &str)>::new()).is_none());
    }
}
