//! Scan filters built from a [`QuotaFilter`].
//!
//! A filter is an immutable predicate tree evaluated per cell: row matchers
//! see the row key, qualifier matchers see the column qualifier. Every
//! generated pattern is anchored at both ends. Literal key prefixes are
//! escaped; the caller's fragments are regular expressions and are inserted
//! as-is inside a non-capturing group.

use std::fmt;

use common::CellFilter;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::model::QuotaFilter;
use crate::serde::{
    NAMESPACE_DELIM_BYTE, QUOTA_NAMESPACE_ROW_KEY_PREFIX, QUOTA_QUALIFIER_SETTINGS_PREFIX,
    QUOTA_TABLE_ROW_KEY_PREFIX, QUOTA_USER_ROW_KEY_PREFIX,
};

/// A compiled, anchored pattern.
#[derive(Clone, Debug)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    fn new(pattern: String) -> Result<Self> {
        let regex = Regex::new(&pattern)
            .map_err(|e| Error::InvalidFilter(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, input: &[u8]) -> bool {
        self.regex.is_match(input)
    }
}

/// Predicate tree attached to a quota scan.
#[derive(Clone, Debug)]
pub enum ScanFilter {
    /// Every child must match. Empty matches everything.
    All(Vec<ScanFilter>),
    /// At least one child must match.
    Any(Vec<ScanFilter>),
    Not(Box<ScanFilter>),
    Row(Matcher),
    Qualifier(Matcher),
}

impl ScanFilter {
    pub fn is_match(&self, row: &[u8], qualifier: &[u8]) -> bool {
        match self {
            ScanFilter::All(children) => children.iter().all(|c| c.is_match(row, qualifier)),
            ScanFilter::Any(children) => children.iter().any(|c| c.is_match(row, qualifier)),
            ScanFilter::Not(child) => !child.is_match(row, qualifier),
            ScanFilter::Row(matcher) => matcher.is_match(row),
            ScanFilter::Qualifier(matcher) => matcher.is_match(qualifier),
        }
    }

    /// True for the filter that matches everything.
    pub fn is_pass_all(&self) -> bool {
        matches!(self, ScanFilter::All(children) if children.is_empty())
    }

    fn row(pattern: String) -> Result<Self> {
        Matcher::new(pattern).map(ScanFilter::Row)
    }

    fn qualifier(pattern: String) -> Result<Self> {
        Matcher::new(pattern).map(ScanFilter::Qualifier)
    }
}

impl CellFilter for ScanFilter {
    fn matches(&self, row: &[u8], _family: &[u8], qualifier: &[u8]) -> bool {
        self.is_match(row, qualifier)
    }
}

impl fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[ScanFilter], op: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")
        }

        match self {
            ScanFilter::All(children) if children.is_empty() => write!(f, "ALL"),
            ScanFilter::All(children) => join(f, children, "AND"),
            ScanFilter::Any(children) => join(f, children, "OR"),
            ScanFilter::Not(child) => write!(f, "NOT {}", child),
            ScanFilter::Row(m) => write!(f, "row =~ /{}/", m.pattern()),
            ScanFilter::Qualifier(m) => write!(f, "qualifier =~ /{}/", m.pattern()),
        }
    }
}

fn quote(literal: &[u8]) -> String {
    regex::escape(&String::from_utf8_lossy(literal))
}

fn row_key_regex(prefix: &[u8], regex: &str) -> String {
    format!("^{}(?:{})$", quote(prefix), regex)
}

pub fn user_row_key_regex(user: &str) -> String {
    row_key_regex(QUOTA_USER_ROW_KEY_PREFIX, user)
}

pub fn table_row_key_regex(table: &str) -> String {
    row_key_regex(QUOTA_TABLE_ROW_KEY_PREFIX, table)
}

pub fn namespace_row_key_regex(namespace: &str) -> String {
    row_key_regex(QUOTA_NAMESPACE_ROW_KEY_PREFIX, namespace)
}

/// Pattern for per-table user qualifiers.
///
/// On its own this would also accept `s.<ns>:` when the fragment can end in
/// the delimiter; [`make_filter`] pairs it with a negated
/// [`settings_qualifier_delimiter_suffix_regex`] match.
pub fn settings_qualifier_regex_for_user_table(table: &str) -> String {
    format!("^{}(?:{})$", quote(QUOTA_QUALIFIER_SETTINGS_PREFIX), table)
}

/// Pattern for per-namespace user qualifiers: `s.<namespace>:`.
pub fn settings_qualifier_regex_for_user_namespace(namespace: &str) -> String {
    format!(
        "^{}(?:{}){}$",
        quote(QUOTA_QUALIFIER_SETTINGS_PREFIX),
        namespace,
        quote(&[NAMESPACE_DELIM_BYTE])
    )
}

/// Pattern matching any qualifier that ends with the namespace delimiter.
pub fn settings_qualifier_delimiter_suffix_regex() -> String {
    format!("{}$", quote(&[NAMESPACE_DELIM_BYTE]))
}

fn user_table_filter(user: &str, table: &str) -> Result<ScanFilter> {
    Ok(ScanFilter::All(vec![
        ScanFilter::row(user_row_key_regex(user))?,
        ScanFilter::qualifier(settings_qualifier_regex_for_user_table(table))?,
        ScanFilter::Not(Box::new(ScanFilter::qualifier(
            settings_qualifier_delimiter_suffix_regex(),
        )?)),
    ]))
}

fn user_namespace_filter(user: &str, namespace: &str) -> Result<ScanFilter> {
    Ok(ScanFilter::All(vec![
        ScanFilter::row(user_row_key_regex(user))?,
        ScanFilter::qualifier(settings_qualifier_regex_for_user_namespace(namespace))?,
    ]))
}

/// Translates a scope filter into a scan predicate.
///
/// A user pattern restricts the scan to user rows, optionally narrowed to
/// per-namespace and/or per-table qualifiers. Otherwise a table pattern,
/// then a namespace pattern, selects rows of that scope. A null filter
/// produces [`ScanFilter::All`] with no children.
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] if a pattern does not compile.
pub fn make_filter(filter: &QuotaFilter) -> Result<ScanFilter> {
    let scan_filter = if let Some(user) = filter.user() {
        let mut user_filters = Vec::new();
        if let Some(namespace) = filter.namespace() {
            user_filters.push(user_namespace_filter(user, namespace)?);
        }
        if let Some(table) = filter.table() {
            user_filters.push(user_table_filter(user, table)?);
        }
        if user_filters.is_empty() {
            user_filters.push(ScanFilter::row(user_row_key_regex(user))?);
        }
        ScanFilter::All(vec![ScanFilter::Any(user_filters)])
    } else if let Some(table) = filter.table() {
        ScanFilter::All(vec![ScanFilter::row(table_row_key_regex(table))?])
    } else if let Some(namespace) = filter.namespace() {
        ScanFilter::All(vec![ScanFilter::row(namespace_row_key_regex(namespace))?])
    } else {
        ScanFilter::All(Vec::new())
    };
    tracing::debug!(filter = %scan_filter, "built quota scan filter");
    Ok(scan_filter)
}
