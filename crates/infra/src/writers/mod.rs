//! Entity writers.
//!
//! A writer performs one store call per operation and invalidates the owning
//! cache key only after that call succeeded. Row handles are re-resolved by id
//! from the current read before every update or delete, since deletes shift
//! the rows below them.

mod company;
mod contact;
mod interaction;
mod opportunity;

use std::sync::Arc;

use sheetcrm_core::CrmConfig;

use crate::cache::RangeCache;
use crate::readers::Readers;

pub use company::{CompanyClaim, CompanyWriter};
pub use contact::ContactWriter;
pub use interaction::InteractionWriter;
pub use opportunity::OpportunityWriter;

/// Outcome of a get-or-create call.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub record: T,
    /// `true` when this call appended the row.
    pub created: bool,
}

impl<T> Resolved<T> {
    pub fn existing(record: T) -> Self {
        Self { record, created: false }
    }

    pub fn created(record: T) -> Self {
        Self { record, created: true }
    }
}

/// All writers over one cache.
#[derive(Clone)]
pub struct Writers {
    pub companies: CompanyWriter,
    pub contacts: ContactWriter,
    pub opportunities: OpportunityWriter,
    pub interactions: InteractionWriter,
}

impl Writers {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>, readers: &Readers) -> Self {
        let opportunities = OpportunityWriter::new(cache.clone(), config.clone(), readers);
        Self {
            companies: CompanyWriter::new(cache.clone(), config.clone(), readers, opportunities.clone()),
            contacts: ContactWriter::new(cache.clone(), config.clone(), readers),
            interactions: InteractionWriter::new(cache, config, readers),
            opportunities,
        }
    }
}
