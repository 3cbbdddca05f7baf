use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use sheetcrm_core::{CompanyId, ContactId, CrmConfig, DomainError};
use sheetcrm_parties::{Contact, ContactDraft, ContactPatch, LeadStatus};

use super::Resolved;
use crate::cache::{RangeCache, keys};
use crate::error::CrmResult;
use crate::readers::{ContactReader, Readers};

/// Writes formal contacts and raw-lead statuses.
#[derive(Clone)]
pub struct ContactWriter {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
    contacts: ContactReader,
    create_lock: Arc<Mutex<()>>,
}

impl ContactWriter {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>, readers: &Readers) -> Self {
        Self {
            cache,
            config,
            contacts: readers.contacts.clone(),
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Contact with the same folded name under `company_id`, or a new row.
    #[instrument(skip(self, draft), fields(contact = %draft.name))]
    pub async fn get_or_create(
        &self,
        draft: &ContactDraft,
        company_id: &CompanyId,
        modifier: &str,
    ) -> CrmResult<Resolved<Contact>> {
        let _guard = self.create_lock.lock().await;
        let existing = self
            .contacts
            .contacts()
            .await?
            .iter()
            .find(|c| c.matches(company_id, &draft.name))
            .cloned();
        if let Some(contact) = existing {
            return Ok(Resolved::existing(contact));
        }

        let now = Utc::now();
        let mut contact = draft.into_contact(ContactId::generate(now), company_id.clone(), modifier, now)?;
        let outcome = self
            .cache
            .store()
            .append_row(&self.config.tables.contacts, contact.to_row())
            .await?;
        contact.row_index = outcome.row_index;
        self.cache.invalidate(keys::CONTACTS);

        info!(contact_id = %contact.contact_id, %company_id, "contact created");
        Ok(Resolved::created(contact))
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &ContactId, patch: &ContactPatch, modifier: &str) -> CrmResult<Contact> {
        let mut contact = self
            .contacts
            .find_contact(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("contact {id}")))?;
        patch.apply(&mut contact, modifier, Utc::now());

        self.cache
            .store()
            .update_row(&self.config.tables.contacts, contact.row_index, contact.to_row())
            .await?;
        self.cache.invalidate(keys::CONTACTS);
        info!(contact_id = %id, "contact updated");
        Ok(contact)
    }

    /// Set the status of the raw lead at `row_index`; returns the prior status.
    #[instrument(skip(self))]
    pub async fn set_lead_status(&self, row_index: u32, status: LeadStatus) -> CrmResult<LeadStatus> {
        let mut lead = self
            .contacts
            .find_lead(row_index)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("raw lead at row {row_index}")))?;
        let prior = std::mem::replace(&mut lead.status, status);

        self.cache
            .store()
            .update_row(&self.config.tables.raw_leads, row_index, lead.to_row())
            .await?;
        self.cache.invalidate(keys::RAW_LEADS);
        info!(row_index, status = %lead.status.to_cell(), "raw lead status updated");
        Ok(prior)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &ContactId) -> CrmResult<()> {
        let contact = self
            .contacts
            .find_contact(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("contact {id}")))?;
        self.cache
            .store()
            .delete_row(&self.config.tables.contacts, contact.row_index)
            .await?;
        self.cache.invalidate(keys::CONTACTS);
        info!(contact_id = %id, "contact deleted");
        Ok(())
    }
}
