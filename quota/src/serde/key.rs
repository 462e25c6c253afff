//! Row key and qualifier encoding.
//!
//! Identifiers are written verbatim after their prefix. Namespaces and table
//! names must not end with the namespace delimiter: a per-table qualifier for
//! such a name would be read back as a per-namespace one. This is a caller
//! precondition and is not checked here.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    NAMESPACE_DELIM_BYTE, QUOTA_FAMILY_INFO, QUOTA_FAMILY_USAGE, QUOTA_NAMESPACE_ROW_KEY_PREFIX,
    QUOTA_QUALIFIER_POLICY, QUOTA_QUALIFIER_SETTINGS, QUOTA_QUALIFIER_SETTINGS_PREFIX,
    QUOTA_TABLE_ROW_KEY_PREFIX, QUOTA_USER_ROW_KEY_PREFIX,
};
use crate::error::{Error, Result};
use crate::model::{QuotaScope, TableName};

/// Scope that can be read from a row key alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowScope {
    Namespace(String),
    Table(TableName),
    User(String),
}

/// Column qualifiers used by the quota table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// `s`: the row's own settings.
    GlobalSettings,
    /// `s.<table>`: a user's settings for one table.
    UserTableSettings(TableName),
    /// `s.<namespace>:`: a user's settings for one namespace.
    UserNamespaceSettings(String),
    /// `p`: a table's space snapshot, in the usage family.
    UsagePolicy,
}

impl Qualifier {
    /// Column family the qualifier lives in.
    pub fn family(&self) -> &'static [u8] {
        match self {
            Qualifier::UsagePolicy => QUOTA_FAMILY_USAGE,
            _ => QUOTA_FAMILY_INFO,
        }
    }
}

/// Which settings record a user-row qualifier addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UserQualifier {
    Global,
    PerTable(TableName),
    PerNamespace(String),
}

fn prefixed(prefix: &[u8], identifier: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(prefix.len() + identifier.len());
    buf.put_slice(prefix);
    buf.put_slice(identifier);
    buf.freeze()
}

fn identifier(key: &[u8], prefix: &[u8]) -> Result<String> {
    let rest = key.strip_prefix(prefix).ok_or_else(|| {
        Error::MalformedKey(format!(
            "expected prefix {:?}, got {:?}",
            Bytes::copy_from_slice(prefix),
            Bytes::copy_from_slice(key)
        ))
    })?;
    String::from_utf8(rest.to_vec()).map_err(|_| {
        Error::MalformedKey(format!(
            "identifier is not valid UTF-8: {:?}",
            Bytes::copy_from_slice(key)
        ))
    })
}

pub fn user_row_key(user: &str) -> Bytes {
    prefixed(QUOTA_USER_ROW_KEY_PREFIX, user.as_bytes())
}

pub fn table_row_key(table: &TableName) -> Bytes {
    prefixed(QUOTA_TABLE_ROW_KEY_PREFIX, table.as_bytes())
}

pub fn namespace_row_key(namespace: &str) -> Bytes {
    prefixed(QUOTA_NAMESPACE_ROW_KEY_PREFIX, namespace.as_bytes())
}

/// Encodes the row key a scope's settings are stored under.
///
/// All user scopes share the user's row; the qualifier tells them apart.
pub fn encode_row_key(scope: &QuotaScope) -> Bytes {
    match scope {
        QuotaScope::Namespace(namespace) => namespace_row_key(namespace),
        QuotaScope::Table(table) => table_row_key(table),
        QuotaScope::UserGlobal(user)
        | QuotaScope::UserForTable(user, _)
        | QuotaScope::UserForNamespace(user, _) => user_row_key(user),
    }
}

pub fn is_namespace_row_key(key: &[u8]) -> bool {
    key.starts_with(QUOTA_NAMESPACE_ROW_KEY_PREFIX)
}

pub fn is_table_row_key(key: &[u8]) -> bool {
    key.starts_with(QUOTA_TABLE_ROW_KEY_PREFIX)
}

pub fn is_user_row_key(key: &[u8]) -> bool {
    key.starts_with(QUOTA_USER_ROW_KEY_PREFIX)
}

pub fn namespace_from_row_key(key: &[u8]) -> Result<String> {
    identifier(key, QUOTA_NAMESPACE_ROW_KEY_PREFIX)
}

pub fn table_from_row_key(key: &[u8]) -> Result<TableName> {
    identifier(key, QUOTA_TABLE_ROW_KEY_PREFIX).map(TableName::from)
}

pub fn user_from_row_key(key: &[u8]) -> Result<String> {
    identifier(key, QUOTA_USER_ROW_KEY_PREFIX)
}

/// Decodes the scope of a row from its two-byte prefix.
///
/// # Errors
///
/// Returns [`Error::MalformedKey`] if the prefix is unknown or the identifier
/// is not UTF-8.
pub fn decode_row_key(key: &[u8]) -> Result<RowScope> {
    if is_namespace_row_key(key) {
        namespace_from_row_key(key).map(RowScope::Namespace)
    } else if is_table_row_key(key) {
        table_from_row_key(key).map(RowScope::Table)
    } else if is_user_row_key(key) {
        user_from_row_key(key).map(RowScope::User)
    } else {
        Err(Error::MalformedKey(format!(
            "unexpected row-key: {:?}",
            Bytes::copy_from_slice(key)
        )))
    }
}

pub fn settings_qualifier_for_user_table(table: &TableName) -> Bytes {
    prefixed(QUOTA_QUALIFIER_SETTINGS_PREFIX, table.as_bytes())
}

pub fn settings_qualifier_for_user_namespace(namespace: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        QUOTA_QUALIFIER_SETTINGS_PREFIX.len() + namespace.len() + 1,
    );
    buf.put_slice(QUOTA_QUALIFIER_SETTINGS_PREFIX);
    buf.put_slice(namespace.as_bytes());
    buf.put_u8(NAMESPACE_DELIM_BYTE);
    buf.freeze()
}

pub fn encode_qualifier(qualifier: &Qualifier) -> Bytes {
    match qualifier {
        Qualifier::GlobalSettings => Bytes::from_static(QUOTA_QUALIFIER_SETTINGS),
        Qualifier::UserTableSettings(table) => settings_qualifier_for_user_table(table),
        Qualifier::UserNamespaceSettings(namespace) => {
            settings_qualifier_for_user_namespace(namespace)
        }
        Qualifier::UsagePolicy => Bytes::from_static(QUOTA_QUALIFIER_POLICY),
    }
}

/// Classifies a qualifier found in a user row's info family.
///
/// Returns `Ok(None)` for qualifiers that are not settings qualifiers,
/// including `s.` with nothing after it.
///
/// # Errors
///
/// Returns [`Error::MalformedKey`] if the name inside a settings qualifier is
/// not UTF-8.
pub fn classify_user_qualifier(qualifier: &[u8]) -> Result<Option<UserQualifier>> {
    if qualifier == QUOTA_QUALIFIER_SETTINGS {
        return Ok(Some(UserQualifier::Global));
    }
    let Some(name) = qualifier.strip_prefix(QUOTA_QUALIFIER_SETTINGS_PREFIX) else {
        return Ok(None);
    };
    if name.is_empty() {
        return Ok(None);
    }
    let name = std::str::from_utf8(name).map_err(|_| {
        Error::MalformedKey(format!(
            "settings qualifier is not valid UTF-8: {:?}",
            Bytes::copy_from_slice(qualifier)
        ))
    })?;
    match name.strip_suffix(NAMESPACE_DELIM_BYTE as char) {
        Some(namespace) => Ok(Some(UserQualifier::PerNamespace(namespace.to_string()))),
        None => Ok(Some(UserQualifier::PerTable(TableName::new(name)))),
    }
}

impl QuotaScope {
    /// Row key the scope's settings are stored under.
    pub fn row_key(&self) -> Bytes {
        encode_row_key(self)
    }

    /// Qualifier the scope's settings are stored under.
    pub fn settings_qualifier(&self) -> Qualifier {
        match self {
            QuotaScope::Namespace(_) | QuotaScope::Table(_) | QuotaScope::UserGlobal(_) => {
                Qualifier::GlobalSettings
            }
            QuotaScope::UserForTable(_, table) => Qualifier::UserTableSettings(table.clone()),
            QuotaScope::UserForNamespace(_, namespace) => {
                Qualifier::UserNamespaceSettings(namespace.clone())
            }
        }
    }

    /// Rebuilds a user scope from the user row and the classified qualifier.
    pub fn for_user(user: String, qualifier: UserQualifier) -> Self {
        match qualifier {
            UserQualifier::Global => QuotaScope::UserGlobal(user),
            UserQualifier::PerTable(table) => QuotaScope::UserForTable(user, table),
            UserQualifier::PerNamespace(namespace) => QuotaScope::UserForNamespace(user, namespace),
        }
    }
}

/// Decodes the full scope of a settings cell.
///
/// Namespace and table rows resolve from the row key alone. User rows also
/// need the qualifier.
///
/// # Errors
///
/// Returns [`Error::MalformedKey`] if the row key is unknown, or if a user
/// row's qualifier is not a settings qualifier.
pub fn decode_scope(row_key: &[u8], qualifier: &[u8]) -> Result<QuotaScope> {
    match decode_row_key(row_key)? {
        RowScope::Namespace(namespace) => Ok(QuotaScope::Namespace(namespace)),
        RowScope::Table(table) => Ok(QuotaScope::Table(table)),
        RowScope::User(user) => match classify_user_qualifier(qualifier)? {
            Some(user_qualifier) => Ok(QuotaScope::for_user(user, user_qualifier)),
            None => Err(Error::MalformedKey(format!(
                "not a settings qualifier: {:?}",
                Bytes::copy_from_slice(qualifier)
            ))),
        },
    }
}
