//! Quota table layout.
//!
//! ```text
//!   ROW-KEY          FAM/QUAL          DATA
//!   n.<namespace>    q:s               <namespace settings>
//!   t.<table>        q:s               <table settings>
//!   t.<table>        u:p               <table space snapshot>
//!   u.<user>         q:s               <user global settings>
//!   u.<user>         q:s.<table>       <user settings for a table>
//!   u.<user>         q:s.<namespace>:  <user settings for a namespace>
//! ```
//!
//! Row prefixes are two bytes wide and mutually exclusive, so the scope of a
//! row is known from its first two bytes. Within a user row the trailing
//! namespace delimiter is the only thing separating a per-namespace
//! qualifier from a per-table one.

pub mod key;
pub mod record;

/// Column family holding settings records.
pub const QUOTA_FAMILY_INFO: &[u8] = b"q";
/// Column family holding usage snapshots.
pub const QUOTA_FAMILY_USAGE: &[u8] = b"u";

pub const QUOTA_QUALIFIER_SETTINGS: &[u8] = b"s";
pub const QUOTA_QUALIFIER_SETTINGS_PREFIX: &[u8] = b"s.";
pub const QUOTA_QUALIFIER_POLICY: &[u8] = b"p";

pub const QUOTA_USER_ROW_KEY_PREFIX: &[u8] = b"u.";
pub const QUOTA_TABLE_ROW_KEY_PREFIX: &[u8] = b"t.";
pub const QUOTA_NAMESPACE_ROW_KEY_PREFIX: &[u8] = b"n.";

/// Byte appended to a namespace in a per-namespace user qualifier.
pub const NAMESPACE_DELIM_BYTE: u8 = crate::model::NAMESPACE_DELIM as u8;

/// Magic prefix in front of every serialized settings record.
pub const PB_MAGIC: &[u8] = b"PBUF";
