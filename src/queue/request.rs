use crate::primitives::{BeaconBlockHeader, KzgCommitment, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimal data needed to fetch and validate the blobs of one slot.
///
/// This is the on-disk record: `header`, `commitments`, `last_retry_time`
/// (RFC 3339, omitted until the first failure) and `failure_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobFetchRequest {
    pub header: BeaconBlockHeader,
    pub commitments: Vec<KzgCommitment>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "retry_time"
    )]
    pub last_retry_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_count: u32,
}

impl BlobFetchRequest {
    pub fn new(header: BeaconBlockHeader, commitments: Vec<KzgCommitment>) -> Self {
        Self {
            header,
            commitments,
            last_retry_time: None,
            failure_count: 0,
        }
    }

    pub fn slot(&self) -> Slot {
        self.header.slot
    }

    /// Whether enough time has passed since the last failed attempt.
    ///
    /// A retry time in the future (clock moved backwards) keeps the request
    /// waiting until the clock catches up.
    pub fn ready_for_retry(&self, now: DateTime<Utc>, retry_interval: Duration) -> bool {
        match self.last_retry_time {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= retry_interval)
                .unwrap_or(false),
        }
    }

    /// Books one more failed attempt made at `now`.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_retry_time = Some(now);
    }
}

/// Serde adapter for `last_retry_time`. Absent, `null` and the year-1 zero
/// timestamp written by older nodes all decode as "never retried".
mod retry_time {
    use chrono::{DateTime, Datelike, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => {
                serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map_err(|err| D::Error::custom(format!("invalid last_retry_time {raw:?}: {err}")))?
            .with_timezone(&Utc);

        if parsed.year() <= 1 {
            return Ok(None);
        }
        Ok(Some(parsed))
    }
}
