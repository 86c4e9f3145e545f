//! Exposure and expiration rules applied when a document is served back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BlueprintError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Visible to anyone and included in listings.
    Public,
    /// Visible to anyone holding the storage key, never listed.
    Unlisted,
    /// Visible to the owner only.
    Private,
}

impl Exposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exposure::Public => "public",
            Exposure::Unlisted => "unlisted",
            Exposure::Private => "private",
        }
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exposure {
    type Err = BlueprintError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(Exposure::Public),
            "unlisted" => Ok(Exposure::Unlisted),
            "private" => Ok(Exposure::Private),
            other => Err(BlueprintError::InvalidRequest(format!(
                "unknown exposure: {}",
                other
            ))),
        }
    }
}

/// Lifetime chosen at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Expiration {
    #[default]
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Expiration {
    pub fn expires_at(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Expiration::Never => None,
            Expiration::OneHour => Some(from + Duration::hours(1)),
            Expiration::OneDay => Some(from + Duration::days(1)),
            Expiration::OneWeek => Some(from + Duration::weeks(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Expired,
    Deleted,
    Forbidden,
}

/// Decide whether `viewer` may see a document. Deletion wins over expiry,
/// which wins over exposure.
pub fn visibility(
    exposure: Exposure,
    owner_id: Option<i64>,
    expires_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    viewer: Option<i64>,
    now: DateTime<Utc>,
) -> Visibility {
    if deleted_at.is_some() {
        return Visibility::Deleted;
    }

    if matches!(expires_at, Some(at) if at <= now) {
        return Visibility::Expired;
    }

    match exposure {
        Exposure::Public | Exposure::Unlisted => Visibility::Visible,
        Exposure::Private => match (owner_id, viewer) {
            (Some(owner), Some(viewer)) if owner == viewer => Visibility::Visible,
            _ => Visibility::Forbidden,
        },
    }
}
