//! Shared building blocks for the CRM data layer.
//!
//! This crate contains **pure** primitives (no IO): the error model, identifiers,
//! the configuration snapshot, cell parsing helpers and pagination.

pub mod config;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod row;
pub mod system_config;
pub mod time;

pub use config::{CrmConfig, StatusValues};
pub use entity::Entity;
pub use error::{DELETE_REFUSED_PREFIX, DomainError, DomainResult};
pub use id::{CompanyId, ContactId, EventLogId, InteractionId, LinkId, OpportunityId};
pub use page::{Listing, Page, PageInfo, paginate};
pub use system_config::{ConfigItem, QuantityBehavior, SystemConfig};
