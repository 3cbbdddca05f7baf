//! Entity readers over the range cache.
//!
//! Each reader owns one (or two) cache keys. Cached values hold whole tables;
//! filtering and lookups run over the cached `Arc<Vec<_>>` on every call.

mod activity;
mod company;
mod contact;
mod link;
mod opportunity;
mod system;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use sheetcrm_core::CrmConfig;

use crate::cache::RangeCache;

pub use activity::{EventLogReader, InteractionReader};
pub use company::CompanyReader;
pub use contact::ContactReader;
pub use link::LinkReader;
pub use opportunity::{OpportunityFilters, OpportunityReader};
pub use system::SystemReader;

/// Descending by time; undated records sort last.
pub(crate) fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// All readers over one cache.
#[derive(Clone)]
pub struct Readers {
    pub companies: CompanyReader,
    pub contacts: ContactReader,
    pub opportunities: OpportunityReader,
    pub links: LinkReader,
    pub interactions: InteractionReader,
    pub event_logs: EventLogReader,
    pub system: SystemReader,
}

impl Readers {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self {
            companies: CompanyReader::new(cache.clone(), config.clone()),
            contacts: ContactReader::new(cache.clone(), config.clone()),
            opportunities: OpportunityReader::new(cache.clone(), config.clone()),
            links: LinkReader::new(cache.clone(), config.clone()),
            interactions: InteractionReader::new(cache.clone(), config.clone()),
            event_logs: EventLogReader::new(cache.clone(), config.clone()),
            system: SystemReader::new(cache, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn undated_records_sort_after_dated_ones() {
        let early = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let late = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        let mut times = vec![None, early, late];
        times.sort_by(|a, b| newest_first(*a, *b));
        assert_eq!(times, vec![late, early, None]);
    }
}
