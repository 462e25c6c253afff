//! Protobuf messages carried in quota table cells.
//!
//! Field numbers follow the quota table's on-disk format. Settings values are
//! stored as a [`Quotas`] message behind a magic prefix; usage values are a
//! bare [`SpaceQuotaSnapshot`] message.

use prost::{Enumeration, Message};

use crate::error::{Error, Result};
use crate::model;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum TimeUnit {
    Nanoseconds = 1,
    Microseconds = 2,
    Milliseconds = 3,
    Seconds = 4,
    Minutes = 5,
    Hours = 6,
    Days = 7,
}

/// Whether a throttle limit applies per machine or to the whole cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum QuotaScope {
    Cluster = 1,
    Machine = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum SpaceViolationPolicy {
    Disable = 1,
    NoWritesCompactions = 2,
    NoWrites = 3,
    NoInserts = 4,
}

/// A rate limit over a time unit.
#[derive(Clone, PartialEq, Message)]
pub struct TimedQuota {
    #[prost(enumeration = "TimeUnit", required, tag = "1")]
    pub time_unit: i32,
    #[prost(uint64, optional, tag = "2")]
    pub soft_limit: Option<u64>,
    #[prost(float, optional, tag = "3")]
    pub share: Option<f32>,
    #[prost(enumeration = "QuotaScope", optional, tag = "4")]
    pub scope: Option<i32>,
}

/// Request and size throttles, each optional.
#[derive(Clone, PartialEq, Message)]
pub struct Throttle {
    #[prost(message, optional, tag = "1")]
    pub req_num: Option<TimedQuota>,
    #[prost(message, optional, tag = "2")]
    pub req_size: Option<TimedQuota>,
    #[prost(message, optional, tag = "3")]
    pub write_num: Option<TimedQuota>,
    #[prost(message, optional, tag = "4")]
    pub write_size: Option<TimedQuota>,
    #[prost(message, optional, tag = "5")]
    pub read_num: Option<TimedQuota>,
    #[prost(message, optional, tag = "6")]
    pub read_size: Option<TimedQuota>,
}

/// Space limit and the policy enforced when it is exceeded.
#[derive(Clone, PartialEq, Message)]
pub struct SpaceQuota {
    #[prost(uint64, optional, tag = "1")]
    pub soft_limit: Option<u64>,
    #[prost(enumeration = "SpaceViolationPolicy", optional, tag = "2")]
    pub violation_policy: Option<i32>,
    #[prost(bool, optional, tag = "3")]
    pub remove: Option<bool>,
}

/// Settings of one quota scope.
#[derive(Clone, PartialEq, Message)]
pub struct Quotas {
    #[prost(bool, optional, tag = "1")]
    pub bypass_globals: Option<bool>,
    #[prost(message, optional, tag = "2")]
    pub throttle: Option<Throttle>,
    #[prost(message, optional, tag = "3")]
    pub space: Option<SpaceQuota>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SpaceQuotaStatus {
    #[prost(enumeration = "SpaceViolationPolicy", optional, tag = "1")]
    pub violation_policy: Option<i32>,
    #[prost(bool, optional, tag = "2")]
    pub in_violation: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SpaceQuotaSnapshot {
    #[prost(message, optional, tag = "1")]
    pub quota_status: Option<SpaceQuotaStatus>,
    #[prost(uint64, optional, tag = "2")]
    pub quota_usage: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub quota_limit: Option<u64>,
}

impl From<model::SpaceViolationPolicy> for SpaceViolationPolicy {
    fn from(policy: model::SpaceViolationPolicy) -> Self {
        match policy {
            model::SpaceViolationPolicy::Disable => SpaceViolationPolicy::Disable,
            model::SpaceViolationPolicy::NoWritesCompactions => {
                SpaceViolationPolicy::NoWritesCompactions
            }
            model::SpaceViolationPolicy::NoWrites => SpaceViolationPolicy::NoWrites,
            model::SpaceViolationPolicy::NoInserts => SpaceViolationPolicy::NoInserts,
        }
    }
}

impl From<SpaceViolationPolicy> for model::SpaceViolationPolicy {
    fn from(policy: SpaceViolationPolicy) -> Self {
        match policy {
            SpaceViolationPolicy::Disable => model::SpaceViolationPolicy::Disable,
            SpaceViolationPolicy::NoWritesCompactions => {
                model::SpaceViolationPolicy::NoWritesCompactions
            }
            SpaceViolationPolicy::NoWrites => model::SpaceViolationPolicy::NoWrites,
            SpaceViolationPolicy::NoInserts => model::SpaceViolationPolicy::NoInserts,
        }
    }
}

/// Converts a wire enum value, rejecting values this build does not know.
pub fn violation_policy_from_i32(value: i32) -> Result<model::SpaceViolationPolicy> {
    SpaceViolationPolicy::try_from(value)
        .map(Into::into)
        .map_err(|_| Error::IllegalInput(format!("unknown space violation policy {}", value)))
}

/// Builds a space quota that carries only a violation policy.
pub fn space_quota_with_policy(policy: model::SpaceViolationPolicy) -> SpaceQuota {
    SpaceQuota {
        violation_policy: Some(SpaceViolationPolicy::from(policy) as i32),
        ..Default::default()
    }
}

/// Reads the violation policy of a space quota.
///
/// # Errors
///
/// Returns [`Error::IllegalInput`] when the policy is missing or unknown.
pub fn policy_of_space_quota(space: &SpaceQuota) -> Result<model::SpaceViolationPolicy> {
    let value = space.violation_policy.ok_or_else(|| {
        Error::IllegalInput("space quota does not have a violation policy".to_string())
    })?;
    violation_policy_from_i32(value)
}

impl From<&model::SpaceQuotaSnapshot> for SpaceQuotaSnapshot {
    fn from(snapshot: &model::SpaceQuotaSnapshot) -> Self {
        let status = snapshot.status();
        SpaceQuotaSnapshot {
            quota_status: Some(SpaceQuotaStatus {
                violation_policy: status
                    .policy()
                    .map(|p| SpaceViolationPolicy::from(p) as i32),
                in_violation: Some(status.is_in_violation()),
            }),
            quota_usage: Some(snapshot.usage()),
            quota_limit: Some(snapshot.limit()),
        }
    }
}

impl TryFrom<&SpaceQuotaSnapshot> for model::SpaceQuotaSnapshot {
    type Error = Error;

    fn try_from(proto: &SpaceQuotaSnapshot) -> Result<Self> {
        let status = match &proto.quota_status {
            Some(status) => model::SpaceQuotaStatus::new(
                status
                    .violation_policy
                    .map(violation_policy_from_i32)
                    .transpose()?,
                status.in_violation.unwrap_or(false),
            ),
            None => model::SpaceQuotaStatus::not_in_violation(),
        };
        Ok(model::SpaceQuotaSnapshot::new(
            status,
            proto.quota_usage.unwrap_or(0),
            proto.quota_limit.unwrap_or(0),
        ))
    }
}
