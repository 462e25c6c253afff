//! Data types addressed by the quota table.

use std::fmt;

/// Namespace of tables whose name carries no explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Separator between namespace and table qualifier in a table name.
pub const NAMESPACE_DELIM: char = ':';

/// A table name in `namespace:qualifier` form.
///
/// [`TableName::with_namespace`] drops the `default` namespace, so
/// `TableName::with_namespace("default", "t1")` equals `TableName::new("t1")`.
/// [`TableName::new`] keeps its input verbatim: `TableName::new("default:t1")`
/// is a different name from `TableName::new("t1")` and encodes to different
/// key bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn with_namespace(namespace: &str, qualifier: &str) -> Self {
        if namespace == DEFAULT_NAMESPACE {
            Self(qualifier.to_string())
        } else {
            Self(format!("{namespace}{NAMESPACE_DELIM}{qualifier}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the namespace part, or [`DEFAULT_NAMESPACE`] if there is none.
    pub fn namespace(&self) -> &str {
        match self.0.split_once(NAMESPACE_DELIM) {
            Some((namespace, _)) => namespace,
            None => DEFAULT_NAMESPACE,
        }
    }

    /// Returns the table part without its namespace.
    pub fn qualifier(&self) -> &str {
        match self.0.split_once(NAMESPACE_DELIM) {
            Some((_, qualifier)) => qualifier,
            None => &self.0,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// What a quota settings record applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QuotaScope {
    Namespace(String),
    Table(TableName),
    UserGlobal(String),
    UserForTable(String, TableName),
    UserForNamespace(String, String),
}

/// Scope filter for quota scans.
///
/// Each pattern is a regular expression fragment matched against the
/// identifier part of a key. Empty patterns count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaFilter {
    user: Option<String>,
    table: Option<String>,
    namespace: Option<String>,
}

impl QuotaFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, regex: impl Into<String>) -> Self {
        self.user = Some(regex.into());
        self
    }

    pub fn with_table(mut self, regex: impl Into<String>) -> Self {
        self.table = Some(regex.into());
        self
    }

    pub fn with_namespace(mut self, regex: impl Into<String>) -> Self {
        self.namespace = Some(regex.into());
        self
    }

    pub fn user(&self) -> Option<&str> {
        non_empty(&self.user)
    }

    pub fn table(&self) -> Option<&str> {
        non_empty(&self.table)
    }

    pub fn namespace(&self) -> Option<&str> {
        non_empty(&self.namespace)
    }

    /// Returns true when no pattern is set and the filter matches everything.
    pub fn is_null(&self) -> bool {
        self.user().is_none() && self.table().is_none() && self.namespace().is_none()
    }
}

fn non_empty(pattern: &Option<String>) -> Option<&str> {
    pattern.as_deref().filter(|p| !p.is_empty())
}

/// Action enforced on a table that exceeds its space quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpaceViolationPolicy {
    Disable,
    NoWritesCompactions,
    NoWrites,
    NoInserts,
}

impl fmt::Display for SpaceViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpaceViolationPolicy::Disable => "DISABLE",
            SpaceViolationPolicy::NoWritesCompactions => "NO_WRITES_COMPACTIONS",
            SpaceViolationPolicy::NoWrites => "NO_WRITES",
            SpaceViolationPolicy::NoInserts => "NO_INSERTS",
        };
        f.write_str(name)
    }
}

/// Enforcement state of a space quota.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpaceQuotaStatus {
    policy: Option<SpaceViolationPolicy>,
    in_violation: bool,
}

impl SpaceQuotaStatus {
    pub fn new(policy: Option<SpaceViolationPolicy>, in_violation: bool) -> Self {
        Self {
            policy,
            in_violation,
        }
    }

    pub fn not_in_violation() -> Self {
        Self::default()
    }

    pub fn in_violation(policy: SpaceViolationPolicy) -> Self {
        Self::new(Some(policy), true)
    }

    pub fn policy(&self) -> Option<SpaceViolationPolicy> {
        self.policy
    }

    pub fn is_in_violation(&self) -> bool {
        self.in_violation
    }
}

/// Point-in-time space usage of a table against its limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpaceQuotaSnapshot {
    status: SpaceQuotaStatus,
    usage: u64,
    limit: u64,
}

impl SpaceQuotaSnapshot {
    pub fn new(status: SpaceQuotaStatus, usage: u64, limit: u64) -> Self {
        Self {
            status,
            usage,
            limit,
        }
    }

    pub fn status(&self) -> SpaceQuotaStatus {
        self.status
    }

    /// Measured size in bytes.
    pub fn usage(&self) -> u64 {
        self.usage
    }

    /// Configured limit in bytes.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Identity of a region server process.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerName {
    pub host: String,
    pub port: u16,
    pub start_code: i64,
}

impl ServerName {
    pub fn new(host: impl Into<String>, port: u16, start_code: i64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}
