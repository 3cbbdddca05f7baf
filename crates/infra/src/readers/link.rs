use std::sync::Arc;

use sheetcrm_core::{CrmConfig, OpportunityId};
use sheetcrm_sales::OpportunityContactLink;
use sheetcrm_sales::link::columns;

use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

/// Opportunity-contact links, in row order.
#[derive(Clone)]
pub struct LinkReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl LinkReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    pub async fn links(&self) -> Result<Arc<Vec<OpportunityContactLink>>, StoreError> {
        let range = RowRange::new(&self.config.tables.opportunity_contacts, columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::OPPORTUNITY_CONTACTS,
                &range,
                |row, handle| {
                    let link = OpportunityContactLink::from_row(row, handle);
                    (!link.link_id.is_empty()).then_some(link)
                },
                |a, b| a.row_index.cmp(&b.row_index),
            )
            .await
    }

    /// Active links of one opportunity.
    pub async fn links_for(&self, opportunity_id: &OpportunityId) -> Result<Vec<OpportunityContactLink>, StoreError> {
        Ok(self
            .links()
            .await?
            .iter()
            .filter(|l| l.opportunity_id == *opportunity_id && l.is_active())
            .cloned()
            .collect())
    }
}
