use std::sync::Arc;

use serde::Deserialize;

use sheetcrm_core::{CrmConfig, Listing, OpportunityId, paginate};
use sheetcrm_sales::Opportunity;
use sheetcrm_sales::opportunity::columns;

use super::newest_first;
use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

/// Exact-match filters for [`OpportunityReader::search`]. Blank means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityFilters {
    pub assignee: Option<String>,
    pub opportunity_type: Option<String>,
    pub stage: Option<String>,
}

impl OpportunityFilters {
    fn accepts(&self, opportunity: &Opportunity) -> bool {
        fn matches(filter: &Option<String>, value: &str) -> bool {
            match filter.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(wanted) => wanted == value,
            }
        }
        matches(&self.assignee, &opportunity.assignee)
            && matches(&self.opportunity_type, &opportunity.opportunity_type)
            && matches(&self.stage, &opportunity.current_stage)
    }
}

#[derive(Clone)]
pub struct OpportunityReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl OpportunityReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    /// Every opportunity, archived ones included, most recently active first.
    pub async fn all(&self) -> Result<Arc<Vec<Opportunity>>, StoreError> {
        let range = RowRange::new(&self.config.tables.opportunities, columns::LAST);
        let statuses = &self.config.statuses;
        self.cache
            .fetch_and_cache(
                keys::OPPORTUNITIES,
                &range,
                |row, handle| {
                    let opportunity = Opportunity::from_row(row, handle, statuses);
                    (!opportunity.opportunity_id.is_empty()).then_some(opportunity)
                },
                |a, b| newest_first(a.self_activity(), b.self_activity()),
            )
            .await
    }

    /// Non-archived opportunities, most recently active first.
    pub async fn opportunities(&self) -> Result<Vec<Opportunity>, StoreError> {
        Ok(self
            .all()
            .await?
            .iter()
            .filter(|o| !o.is_archived())
            .cloned()
            .collect())
    }

    /// Search non-archived opportunities.
    ///
    /// A query starting with `opp` matches ids exactly (ignoring case); any
    /// other query is a case-insensitive substring of the name or company.
    /// Page 0 returns every match.
    pub async fn search(
        &self,
        query: &str,
        page: usize,
        filters: &OpportunityFilters,
    ) -> Result<Listing<Opportunity>, StoreError> {
        let query = query.trim().to_lowercase();
        let matches_query = |o: &Opportunity| {
            if query.is_empty() {
                true
            } else if query.starts_with("opp") {
                o.opportunity_id.as_str().eq_ignore_ascii_case(&query)
            } else {
                o.opportunity_name.to_lowercase().contains(&query)
                    || o.customer_company.to_lowercase().contains(&query)
            }
        };

        let found: Vec<Opportunity> = self
            .opportunities()
            .await?
            .into_iter()
            .filter(|o| matches_query(o) && filters.accepts(o))
            .collect();

        Ok(paginate(found, page, self.config.pagination.opportunities_per_page))
    }

    /// Any opportunity with this id, archived or not.
    pub async fn find(&self, id: &OpportunityId) -> Result<Option<Opportunity>, StoreError> {
        Ok(self.all().await?.iter().find(|o| o.opportunity_id == *id).cloned())
    }

    /// Direct children of `parent`.
    pub async fn children(&self, parent: &OpportunityId) -> Result<Vec<Opportunity>, StoreError> {
        Ok(self
            .all()
            .await?
            .iter()
            .filter(|o| o.parent_opportunity_id.as_ref() == Some(parent))
            .cloned()
            .collect())
    }
}
