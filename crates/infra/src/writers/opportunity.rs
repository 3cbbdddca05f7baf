use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use sheetcrm_core::{ContactId, CrmConfig, DomainError, LinkId, OpportunityId};
use sheetcrm_sales::{
    Opportunity, OpportunityContactLink, OpportunityPatch, OpportunityStatus, check_parent_link,
};

use super::Resolved;
use crate::cache::{RangeCache, keys};
use crate::error::{CrmResult, StoreError};
use crate::readers::{LinkReader, OpportunityReader, Readers, SystemReader};

/// Writes opportunities and their contact links.
#[derive(Clone)]
pub struct OpportunityWriter {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
    opportunities: OpportunityReader,
    links: LinkReader,
    system: SystemReader,
}

impl OpportunityWriter {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>, readers: &Readers) -> Self {
        Self {
            cache,
            config,
            opportunities: readers.opportunities.clone(),
            links: readers.links.clone(),
            system: readers.system.clone(),
        }
    }

    fn table(&self) -> &str {
        &self.config.tables.opportunities
    }

    async fn require(&self, id: &OpportunityId) -> CrmResult<Opportunity> {
        self.opportunities
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("opportunity {id}")).into())
    }

    /// Append a fully built row; returns it with its row handle.
    #[instrument(skip(self, opportunity), fields(opportunity_id = %opportunity.opportunity_id))]
    pub async fn append(&self, mut opportunity: Opportunity) -> CrmResult<Opportunity> {
        let outcome = self
            .cache
            .store()
            .append_row(self.table(), opportunity.to_row(&self.config.statuses))
            .await?;
        opportunity.row_index = outcome.row_index;
        self.cache.invalidate(keys::OPPORTUNITIES);
        info!(row_index = opportunity.row_index, "opportunity appended");
        Ok(opportunity)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &OpportunityId, patch: &OpportunityPatch, modifier: &str) -> CrmResult<Opportunity> {
        let all = self.opportunities.all().await?;
        let mut opportunity = all
            .iter()
            .find(|o| o.opportunity_id == *id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("opportunity {id}")))?;

        if let Some(parent) = patch.parent_opportunity_id.as_deref().and_then(OpportunityId::from_cell) {
            if !all.iter().any(|o| o.opportunity_id == parent) {
                return Err(DomainError::not_found(format!("parent opportunity {parent}")).into());
            }
            check_parent_link(&all, id, &parent)?;
        }

        let system = self.system.system_config().await?;
        patch.apply(
            &mut opportunity,
            &system,
            &self.config.categories.order_specification,
            modifier,
            Utc::now(),
        )?;

        self.cache
            .store()
            .update_row(self.table(), opportunity.row_index, opportunity.to_row(&self.config.statuses))
            .await?;
        self.cache.invalidate(keys::OPPORTUNITIES);
        info!(opportunity_id = %id, stage = %opportunity.current_stage, "opportunity updated");
        Ok(opportunity)
    }

    pub async fn archive(&self, id: &OpportunityId, modifier: &str) -> CrmResult<Opportunity> {
        let patch = OpportunityPatch {
            current_status: Some(OpportunityStatus::Archived),
            ..Default::default()
        };
        self.update(id, &patch, modifier).await
    }

    /// Point each of `opportunities` at `company_name`; returns the rows written.
    ///
    /// The cache is invalidated even when a later row fails, since earlier
    /// rows are already written.
    pub async fn set_company_name(
        &self,
        opportunities: Vec<Opportunity>,
        company_name: &str,
        modifier: &str,
    ) -> CrmResult<usize> {
        let mut rewritten = 0;
        let result = async {
            for mut opportunity in opportunities {
                opportunity.customer_company = company_name.to_string();
                opportunity.last_modifier = modifier.to_string();
                self.cache
                    .store()
                    .update_row(self.table(), opportunity.row_index, opportunity.to_row(&self.config.statuses))
                    .await?;
                rewritten += 1;
            }
            Ok::<_, StoreError>(())
        }
        .await;

        if rewritten > 0 {
            self.cache.invalidate(keys::OPPORTUNITIES);
        }
        result?;
        info!(company = company_name, rewritten, "opportunity company names rewritten");
        Ok(rewritten)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &OpportunityId) -> CrmResult<()> {
        let opportunity = self.require(id).await?;
        self.cache
            .store()
            .delete_row(self.table(), opportunity.row_index)
            .await?;
        self.cache.invalidate(keys::OPPORTUNITIES);
        info!(opportunity_id = %id, "opportunity deleted");
        Ok(())
    }

    /// Active link between the two, appending one if none exists.
    #[instrument(skip(self))]
    pub async fn link_contact(
        &self,
        opportunity_id: &OpportunityId,
        contact_id: &ContactId,
        modifier: &str,
    ) -> CrmResult<Resolved<OpportunityContactLink>> {
        let existing = self
            .links
            .links()
            .await?
            .iter()
            .find(|l| l.joins(opportunity_id, contact_id) && l.is_active())
            .cloned();
        if let Some(link) = existing {
            return Ok(Resolved::existing(link));
        }

        let mut link = OpportunityContactLink::new(
            LinkId::generate(),
            opportunity_id.clone(),
            contact_id.clone(),
            modifier,
            Utc::now(),
        );
        let outcome = self
            .cache
            .store()
            .append_row(&self.config.tables.opportunity_contacts, link.to_row())
            .await?;
        link.row_index = outcome.row_index;
        self.cache.invalidate(keys::OPPORTUNITY_CONTACTS);
        info!(link_id = %link.link_id, "contact linked");
        Ok(Resolved::created(link))
    }

    #[instrument(skip(self))]
    pub async fn unlink(&self, link_id: &LinkId) -> CrmResult<()> {
        let Some(link) = self
            .links
            .links()
            .await?
            .iter()
            .find(|l| l.link_id == *link_id)
            .cloned()
        else {
            warn!(%link_id, "link already gone");
            return Ok(());
        };
        self.cache
            .store()
            .delete_row(&self.config.tables.opportunity_contacts, link.row_index)
            .await?;
        self.cache.invalidate(keys::OPPORTUNITY_CONTACTS);
        info!(%link_id, "contact unlinked");
        Ok(())
    }
}
