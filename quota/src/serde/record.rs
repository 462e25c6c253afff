//! Settings and snapshot value encoding.
//!
//! ```text
//! settings value: | "PBUF" (4 bytes) | protobuf Quotas            |
//! usage value:    | protobuf SpaceQuotaSnapshot (no magic prefix) |
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;

use super::PB_MAGIC;
use crate::error::{Error, Result};
use crate::model::SpaceQuotaSnapshot;
use crate::proto;

/// Serializes settings behind the magic prefix.
pub fn quotas_to_data(quotas: &proto::Quotas) -> Bytes {
    let mut buf = BytesMut::with_capacity(PB_MAGIC.len() + quotas.encoded_len());
    buf.put_slice(PB_MAGIC);
    buf.put_slice(&quotas.encode_to_vec());
    buf.freeze()
}

/// Deserializes settings, checking the magic prefix first.
///
/// # Errors
///
/// Returns [`Error::CorruptRecord`] if the magic prefix is missing or the
/// payload is not a valid message.
pub fn quotas_from_data(data: &[u8]) -> Result<proto::Quotas> {
    let payload = data.strip_prefix(PB_MAGIC).ok_or_else(|| {
        Error::CorruptRecord(format!(
            "Missing pb magic prefix in {} byte value",
            data.len()
        ))
    })?;
    proto::Quotas::decode(payload)
        .map_err(|e| Error::CorruptRecord(format!("invalid quotas payload: {}", e)))
}

/// Returns true when the settings carry nothing to enforce.
///
/// A space quota only counts when it has both a soft limit and a violation
/// policy.
pub fn is_empty_quota(quotas: &proto::Quotas) -> bool {
    let mut has_settings = quotas.throttle.is_some() || quotas.bypass_globals.is_some();
    if let Some(space) = &quotas.space {
        has_settings |= space.soft_limit.is_some() && space.violation_policy.is_some();
    }
    !has_settings
}

pub fn snapshot_to_data(snapshot: &SpaceQuotaSnapshot) -> Bytes {
    Bytes::from(proto::SpaceQuotaSnapshot::from(snapshot).encode_to_vec())
}

/// Deserializes a usage snapshot.
///
/// # Errors
///
/// Returns [`Error::IllegalInput`] if the value is not a valid snapshot.
pub fn snapshot_from_data(data: &[u8]) -> Result<SpaceQuotaSnapshot> {
    let message = proto::SpaceQuotaSnapshot::decode(data).map_err(|e| {
        Error::IllegalInput(format!(
            "value did not contain a valid SpaceQuotaSnapshot message: {}",
            e
        ))
    })?;
    SpaceQuotaSnapshot::try_from(&message)
}
