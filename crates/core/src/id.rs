//! Strongly-typed identifiers used across the domain.
//!
//! Store rows carry identifiers as plain text. Business-visible ids (companies,
//! contacts, opportunities) are derived from a monotonic millisecond clock so
//! they sort by creation time; auxiliary rows use UUIDv7.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond stamp that is strictly greater than every stamp handed out before
/// in this process, so two ids generated within the same millisecond never collide.
pub fn monotonic_millis(now: DateTime<Utc>) -> i64 {
    let candidate = now.timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = if candidate > last { candidate } else { last + 1 };
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

macro_rules! text_id {
    ($(#[$meta:meta])* $t:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(String);

        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// `None` for a blank cell.
            pub fn from_cell(cell: &str) -> Option<Self> {
                let trimmed = cell.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

text_id!(
    /// Identifier of a company row (`COMP<millis>`).
    CompanyId
);
text_id!(
    /// Identifier of a contact row (`CON<millis>`).
    ContactId
);
text_id!(
    /// Identifier of an opportunity row (`OPP<millis>`).
    OpportunityId
);
text_id!(
    /// Identifier of an interaction row.
    InteractionId
);
text_id!(
    /// Identifier of an opportunity/contact link row.
    LinkId
);
text_id!(
    /// Identifier of an event log row.
    EventLogId
);

impl CompanyId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("COMP{}", monotonic_millis(now)))
    }
}

impl ContactId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("CON{}", monotonic_millis(now)))
    }
}

impl OpportunityId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("OPP{}", monotonic_millis(now)))
    }
}

impl InteractionId {
    pub fn generate() -> Self {
        Self(format!("INT-{}", Uuid::now_v7().simple()))
    }
}

impl LinkId {
    pub fn generate() -> Self {
        Self(format!("LNK-{}", Uuid::now_v7().simple()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_generated_in_the_same_millisecond_are_distinct_and_ordered() {
        let now = Utc::now();
        let a = OpportunityId::generate(now);
        let b = OpportunityId::generate(now);
        assert_ne!(a, b);

        let stamp = |id: &OpportunityId| id.as_str()[3..].parse::<i64>().unwrap();
        assert!(stamp(&b) > stamp(&a));
    }

    #[test]
    fn blank_cells_have_no_id() {
        assert_eq!(CompanyId::from_cell("   "), None);
        assert_eq!(
            CompanyId::from_cell(" COMP1 "),
            Some(CompanyId::new("COMP1"))
        );
    }

    #[test]
    fn prefixes_follow_entity_kind() {
        let now = Utc::now();
        assert!(CompanyId::generate(now).as_str().starts_with("COMP"));
        assert!(ContactId::generate(now).as_str().starts_with("CON"));
        assert!(InteractionId::generate().as_str().starts_with("INT-"));
        assert!(LinkId::generate().as_str().starts_with("LNK-"));
    }
}
