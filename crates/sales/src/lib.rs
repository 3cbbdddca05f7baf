//! Opportunities and the won-deal analysis.
//!
//! Pure domain logic: the 24-column opportunity record, order specifications
//! with their auto value, and the sales aggregation. No IO.

pub mod analysis;
pub mod link;
pub mod opportunity;
pub mod order_spec;

pub use analysis::{
    Distribution, DistributionEntry, MonthlyBucket, SalesAnalysis, SalesOverview, SalesWindow,
    TopDeal, analyze,
};
pub use link::OpportunityContactLink;
pub use opportunity::{
    Opportunity, OpportunityDraft, OpportunityPatch, OpportunityStatus, ValueMode,
    check_parent_link,
};
pub use order_spec::{OrderSpecification, format_value};
