//! Compound operations over several tables.
//!
//! The store has no multi-table transaction, so each workflow is an ordered
//! sequence of single-table writes run as a [`Saga`]. Later writes consume ids
//! produced by earlier ones, so steps never run concurrently. Only rows a
//! workflow created itself are compensated; companies and contacts that
//! get-or-create resolved to an existing row are left alone. A created
//! company is only removed once no other workflow claims it and nothing in
//! the store references it.

mod saga;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use sheetcrm_activity::{Interaction, InteractionSubject, NewInteraction};
use sheetcrm_core::{ContactId, CrmConfig, DomainError, OpportunityId};
use sheetcrm_parties::{
    Company, Contact, ContactDraft, ContactPatch, ContactSource, LeadStatus, NewCompany, RawLead,
};
use sheetcrm_sales::{Opportunity, OpportunityContactLink, OpportunityDraft};

use crate::error::CrmResult;
use crate::readers::Readers;
use crate::writers::{CompanyClaim, Resolved, Writers};

pub use saga::{Saga, SagaOutcome};

pub const UPGRADED_TITLE: &str = "Upgraded from lead";
pub const CREATED_TITLE: &str = "Created manually";

/// Everything the opportunity workflows wrote or resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOpportunity {
    pub opportunity: Opportunity,
    pub company: Company,
    pub company_created: bool,
    pub contact: Option<Contact>,
    pub interaction: Interaction,
    pub link: Option<OpportunityContactLink>,
}

/// Company and contact a raw lead was filed or linked to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadContact {
    pub company: Company,
    pub contact: Contact,
}

#[derive(Clone)]
pub struct WorkflowService {
    config: Arc<CrmConfig>,
    readers: Readers,
    writers: Writers,
}

impl WorkflowService {
    pub fn new(config: Arc<CrmConfig>, readers: Readers, writers: Writers) -> Self {
        Self {
            config,
            readers,
            writers,
        }
    }

    async fn require_lead(&self, row_index: u32) -> CrmResult<RawLead> {
        self.readers
            .contacts
            .find_lead(row_index)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("raw lead at row {row_index}")).into())
    }

    fn modifier_for(&self, assignee: &str) -> String {
        let assignee = assignee.trim();
        if assignee.is_empty() {
            self.config.pipeline.default_modifier.clone()
        } else {
            assignee.to_string()
        }
    }

    /// Create an opportunity from hand-entered data.
    #[instrument(skip(self, draft), fields(opportunity = %draft.opportunity_name))]
    pub async fn create_opportunity(&self, draft: OpportunityDraft) -> CrmResult<CreatedOpportunity> {
        let contact = ContactDraft {
            name: draft.main_contact.clone(),
            company: draft.customer_company.clone(),
            phone: draft.contact_phone.clone(),
            ..Default::default()
        };
        self.run_opportunity("create_opportunity", &draft, &contact, None)
            .await
    }

    /// Turn the raw lead at `row_index` into an opportunity. Company, main
    /// contact and phone come from the lead; the rest from `draft`.
    #[instrument(skip(self, draft))]
    pub async fn upgrade_lead(&self, row_index: u32, mut draft: OpportunityDraft) -> CrmResult<CreatedOpportunity> {
        let lead = self.require_lead(row_index).await?;
        if lead.company.trim().is_empty() {
            return Err(DomainError::missing_field("lead company").into());
        }
        draft.customer_company = lead.company.clone();
        draft.main_contact = lead.name.clone();
        draft.contact_phone = lead.best_phone().to_string();

        self.run_opportunity("upgrade_lead", &draft, &lead.to_draft(), Some(&lead))
            .await
    }

    async fn run_opportunity(
        &self,
        name: &'static str,
        draft: &OpportunityDraft,
        contact: &ContactDraft,
        lead: Option<&RawLead>,
    ) -> CrmResult<CreatedOpportunity> {
        if draft.opportunity_name.trim().is_empty() {
            return Err(DomainError::missing_field("opportunity name").into());
        }
        let modifier = self.modifier_for(&draft.assignee);

        let mut saga = Saga::new(name);
        match self
            .opportunity_steps(&mut saga, draft, contact, lead, &modifier)
            .await
        {
            Ok(created) => {
                saga.commit();
                info!(
                    opportunity_id = %created.opportunity.opportunity_id,
                    row_index = created.opportunity.row_index,
                    company = %created.company.company_name,
                    "opportunity workflow completed"
                );
                Ok(created)
            }
            Err(err) => Err(saga.abort(err).await.0),
        }
    }

    async fn opportunity_steps<'a>(
        &'a self,
        saga: &mut Saga<'a>,
        draft: &OpportunityDraft,
        contact_draft: &ContactDraft,
        lead: Option<&RawLead>,
        modifier: &str,
    ) -> CrmResult<CreatedOpportunity> {
        let writers = &self.writers;

        let (company, claim) = writers
            .companies
            .get_or_create_claimed(
                NewCompany {
                    name: draft.customer_company.clone(),
                    phone: contact_draft.phone.clone(),
                    address: contact_draft.address.clone(),
                    region: String::new(),
                },
                modifier,
            )
            .await?;
        let _claim = self.compensate_company(saga, company.created, claim);
        debug!(saga = saga.name(), company_id = %company.record.company_id, created = company.created, "company resolved");

        let contact = if contact_draft.name.trim().is_empty() {
            debug!(saga = saga.name(), "no main contact supplied");
            None
        } else {
            let contact = writers
                .contacts
                .get_or_create(contact_draft, &company.record.company_id, modifier)
                .await?;
            if contact.created {
                let id = contact.record.contact_id.clone();
                saga.on_undo("contact", async move { writers.contacts.delete(&id).await });
            }
            Some(contact.record)
        };

        let stage = match draft.current_stage.trim() {
            "" => self.readers.system.default_stage().await?,
            stage => stage.to_string(),
        };

        let now = Utc::now();
        let opportunity = draft.into_opportunity(
            OpportunityId::generate(now),
            &company.record.company_name,
            &stage,
            modifier,
            now,
        )?;
        let opportunity = writers.opportunities.append(opportunity).await?;
        {
            let id = opportunity.opportunity_id.clone();
            saga.on_undo("opportunity", async move { writers.opportunities.delete(&id).await });
        }

        let (title, summary) = match lead {
            Some(lead) => (
                UPGRADED_TITLE,
                format!("Raw lead {} ({}) upgraded to an opportunity.", lead.name, lead.company),
            ),
            None => (
                CREATED_TITLE,
                format!("Opportunity \"{}\" created manually.", opportunity.opportunity_name),
            ),
        };
        let interaction = writers
            .interactions
            .create(NewInteraction::new(
                InteractionSubject::Opportunity(opportunity.opportunity_id.clone()),
                self.config.pipeline.system_event_type.clone(),
                title,
                summary,
                modifier,
            ))
            .await?;
        {
            let id = interaction.interaction_id.clone();
            saga.on_undo("interaction", async move { writers.interactions.delete(&id).await });
        }

        let link = match &contact {
            Some(contact) => {
                let link = writers
                    .opportunities
                    .link_contact(&opportunity.opportunity_id, &contact.contact_id, modifier)
                    .await?;
                if link.created {
                    let id = link.record.link_id.clone();
                    saga.on_undo("link", async move { writers.opportunities.unlink(&id).await });
                }
                Some(link.record)
            }
            None => None,
        };

        if let Some(lead) = lead {
            self.mark_lead(saga, lead.row_index, LeadStatus::Upgraded).await?;
        }

        Ok(CreatedOpportunity {
            opportunity,
            company: company.record,
            company_created: company.created,
            contact,
            interaction,
            link,
        })
    }

    /// Set a lead status and register the restore of the prior one.
    async fn mark_lead<'a>(&'a self, saga: &mut Saga<'a>, row_index: u32, status: LeadStatus) -> CrmResult<()> {
        let prior = self
            .writers
            .contacts
            .set_lead_status(row_index, status)
            .await?;
        let contacts = &self.writers.contacts;
        saga.on_undo("lead status", async move {
            contacts.set_lead_status(row_index, prior).await.map(|_| ())
        });
        Ok(())
    }

    /// File the raw lead at `row_index` as a formal company and contact.
    #[instrument(skip(self))]
    pub async fn file_lead(&self, row_index: u32, modifier: &str) -> CrmResult<LeadContact> {
        let lead = self.require_lead(row_index).await?;
        if lead.name.trim().is_empty() || lead.company.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "raw lead at row {row_index} needs both a name and a company to be filed"
            ))
            .into());
        }

        let mut saga = Saga::new("file_lead");
        match self.file_steps(&mut saga, &lead, modifier).await {
            Ok(filed) => {
                saga.commit();
                info!(row_index, contact_id = %filed.contact.contact_id, "raw lead filed");
                Ok(filed)
            }
            Err(err) => Err(saga.abort(err).await.0),
        }
    }

    async fn file_steps<'a>(&'a self, saga: &mut Saga<'a>, lead: &RawLead, modifier: &str) -> CrmResult<LeadContact> {
        let draft = lead.to_draft();
        let (company, _claim) = self.resolve_lead_company(saga, lead, modifier).await?;

        let contact = self
            .writers
            .contacts
            .get_or_create(&draft, &company.company_id, modifier)
            .await?;
        if contact.created {
            let contacts = &self.writers.contacts;
            let id = contact.record.contact_id.clone();
            saga.on_undo("contact", async move { contacts.delete(&id).await });
        }

        self.mark_lead(saga, lead.row_index, LeadStatus::Filed).await?;
        Ok(LeadContact {
            company,
            contact: contact.record,
        })
    }

    /// Overwrite a hand-entered contact with the raw lead at `row_index`
    /// and mark the lead linked.
    #[instrument(skip(self))]
    pub async fn link_lead_to_contact(
        &self,
        contact_id: &ContactId,
        row_index: u32,
        modifier: &str,
    ) -> CrmResult<LeadContact> {
        let (contact, lead) = tokio::try_join!(
            self.readers.contacts.find_contact(contact_id),
            self.readers.contacts.find_lead(row_index),
        )?;
        let contact = contact.ok_or_else(|| DomainError::not_found(format!("contact {contact_id}")))?;
        let lead = lead.ok_or_else(|| DomainError::not_found(format!("raw lead at row {row_index}")))?;
        if contact.source != ContactSource::Manual {
            return Err(DomainError::validation(format!(
                "contact {contact_id} was not entered manually and cannot take a lead"
            ))
            .into());
        }

        let mut saga = Saga::new("link_lead_to_contact");
        match self.link_steps(&mut saga, &contact, &lead, modifier).await {
            Ok(linked) => {
                saga.commit();
                info!(row_index, %contact_id, "raw lead linked to contact");
                Ok(linked)
            }
            Err(err) => Err(saga.abort(err).await.0),
        }
    }

    async fn link_steps<'a>(
        &'a self,
        saga: &mut Saga<'a>,
        contact: &Contact,
        lead: &RawLead,
        modifier: &str,
    ) -> CrmResult<LeadContact> {
        let (company, _claim) = self.resolve_lead_company(saga, lead, modifier).await?;

        let patch = ContactPatch {
            source: Some(ContactSource::Lead(lead.row_index)),
            name: Some(lead.name.clone()),
            company_id: Some(company.company_id.clone()),
            department: Some(lead.department.clone()),
            position: Some(lead.position.clone()),
            mobile: Some(lead.mobile.clone()),
            phone: Some(lead.phone.clone()),
            email: Some(lead.email.clone()),
        };
        let contacts = &self.writers.contacts;
        let updated = contacts.update(&contact.contact_id, &patch, modifier).await?;
        {
            let id = contact.contact_id.clone();
            let restore = ContactPatch::restoring(contact);
            let prior_modifier = contact.last_modifier.clone();
            saga.on_undo("contact", async move {
                contacts.update(&id, &restore, &prior_modifier).await.map(|_| ())
            });
        }

        self.mark_lead(saga, lead.row_index, LeadStatus::Linked).await?;
        Ok(LeadContact {
            company,
            contact: updated,
        })
    }

    async fn resolve_lead_company<'a>(
        &'a self,
        saga: &mut Saga<'a>,
        lead: &RawLead,
        modifier: &str,
    ) -> CrmResult<(Company, Option<CompanyClaim>)> {
        let (Resolved { record, created }, claim) = self
            .writers
            .companies
            .get_or_create_claimed(
                NewCompany {
                    name: lead.company.clone(),
                    phone: lead.phone.clone(),
                    address: lead.address.clone(),
                    region: String::new(),
                },
                modifier,
            )
            .await?;
        let claim = self.compensate_company(saga, created, claim);
        Ok((record, claim))
    }

    /// Register the removal of a company this workflow created. Otherwise
    /// hand the claim back so the caller holds it until its steps finish.
    fn compensate_company<'a>(
        &'a self,
        saga: &mut Saga<'a>,
        created: bool,
        claim: CompanyClaim,
    ) -> Option<CompanyClaim> {
        if !created {
            return Some(claim);
        }
        let companies = &self.writers.companies;
        saga.on_undo("company", async move {
            companies.delete_if_unreferenced(claim).await.map(|_| ())
        });
        None
    }
}
