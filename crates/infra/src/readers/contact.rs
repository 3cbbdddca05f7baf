use std::sync::Arc;

use sheetcrm_core::time::parse_timestamp;
use sheetcrm_core::{CompanyId, ContactId, CrmConfig};
use sheetcrm_parties::contact::{columns, lead_columns};
use sheetcrm_parties::{Contact, RawLead, same_company};

use super::newest_first;
use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

/// Formal contacts and the raw-lead inbox.
#[derive(Clone)]
pub struct ContactReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl ContactReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    pub async fn contacts(&self) -> Result<Arc<Vec<Contact>>, StoreError> {
        let range = RowRange::new(&self.config.tables.contacts, columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::CONTACTS,
                &range,
                |row, handle| {
                    let contact = Contact::from_row(row, handle);
                    (!contact.contact_id.is_empty()).then_some(contact)
                },
                |a, b| a.name.cmp(&b.name),
            )
            .await
    }

    pub async fn contacts_of(&self, company_id: &CompanyId) -> Result<Vec<Contact>, StoreError> {
        Ok(self
            .contacts()
            .await?
            .iter()
            .filter(|c| c.company_id.as_ref() == Some(company_id))
            .cloned()
            .collect())
    }

    pub async fn find_contact(&self, id: &ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts().await?.iter().find(|c| c.contact_id == *id).cloned())
    }

    /// Every raw lead, newest first. Rows without a name or company are skipped.
    pub async fn all_raw_leads(&self) -> Result<Arc<Vec<RawLead>>, StoreError> {
        let range = RowRange::new(&self.config.tables.raw_leads, lead_columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::RAW_LEADS,
                &range,
                |row, handle| {
                    let lead = RawLead::from_row(row, handle);
                    (!lead.name.trim().is_empty() || !lead.company.trim().is_empty()).then_some(lead)
                },
                |a, b| {
                    newest_first(parse_timestamp(&a.created_time), parse_timestamp(&b.created_time))
                        .then(b.row_index.cmp(&a.row_index))
                },
            )
            .await
    }

    /// Newest raw leads, at most `limit` of them.
    pub async fn raw_leads(&self, limit: Option<usize>) -> Result<Vec<RawLead>, StoreError> {
        let leads = self.all_raw_leads().await?;
        let take = limit.unwrap_or(leads.len());
        Ok(leads.iter().take(take).cloned().collect())
    }

    pub async fn find_lead(&self, row_index: u32) -> Result<Option<RawLead>, StoreError> {
        Ok(self
            .all_raw_leads()
            .await?
            .iter()
            .find(|lead| lead.row_index == row_index)
            .cloned())
    }

    /// Raw leads whose company resolves to `company_name`.
    pub async fn potential_contacts(&self, company_name: &str) -> Result<Vec<RawLead>, StoreError> {
        Ok(self
            .all_raw_leads()
            .await?
            .iter()
            .filter(|lead| same_company(&lead.company, company_name))
            .cloned()
            .collect())
    }
}
