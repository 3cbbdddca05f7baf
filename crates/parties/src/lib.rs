//! Parties of the CRM: companies, their contacts, and raw leads.
//!
//! Pure record types and row layouts (no IO). Company identity is the
//! normalized company name; see [`normalize`].

pub mod company;
pub mod contact;
pub mod normalize;

pub use company::{Company, CompanyPatch, NewCompany};
pub use contact::{
    Contact, ContactDraft, ContactPatch, ContactSource, LeadStatus, RawLead, fold_name,
};
pub use normalize::{normalize_company_name, same_company};
