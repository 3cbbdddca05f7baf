//! Services composing readers and writers: company rules, pipeline views and
//! the sales analysis.

mod company;
mod company_index;
mod pipeline;
mod sales;

pub use company::{
    CompanyActivity, CompanyDetails, CompanyInfo, CompanyService, OpportunityActivity, PotentialCompany,
};
pub use company_index::CompanyIndex;
pub use pipeline::{PipelineService, RegionCount, StageGroup};
pub use sales::SalesAnalysisService;
