//! Data-access and workflow layer over the spreadsheet store: cache-backed
//! readers, invalidating writers, company rules, sales analysis and the
//! multi-table workflows.

pub mod cache;
pub mod context;
pub mod error;
pub mod readers;
pub mod services;
pub mod store;
pub mod workflow;
pub mod writers;

pub use cache::{Invalidation, RangeCache};
pub use context::CrmServices;
pub use error::{CrmError, CrmResult, ErrorClass, StoreError};
