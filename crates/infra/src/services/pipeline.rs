//! Pipeline views over open opportunities.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use sheetcrm_core::{CompanyId, CrmConfig};
use sheetcrm_sales::{Opportunity, OpportunityStatus};

use super::CompanyIndex;
use crate::error::CrmResult;
use crate::readers::Readers;

/// Active opportunities sitting in one configured stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageGroup {
    pub value: String,
    pub label: String,
    pub count: usize,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub region: String,
    pub count: usize,
}

#[derive(Clone)]
pub struct PipelineService {
    config: Arc<CrmConfig>,
    readers: Readers,
}

impl PipelineService {
    pub fn new(config: Arc<CrmConfig>, readers: Readers) -> Self {
        Self { config, readers }
    }

    /// One group per configured stage, in configured order. Only opportunities
    /// with status `active` are placed; stages outside the configuration are
    /// dropped.
    pub async fn by_stage(&self) -> CrmResult<Vec<StageGroup>> {
        let (opportunities, system) = tokio::try_join!(
            self.readers.opportunities.opportunities(),
            self.readers.system.system_config(),
        )?;

        let mut groups: Vec<StageGroup> = system
            .items(&self.config.categories.opportunity_stage)
            .iter()
            .map(|item| StageGroup {
                value: item.value.clone(),
                label: item.display().to_string(),
                count: 0,
                opportunities: Vec::new(),
            })
            .collect();

        for opportunity in opportunities {
            if opportunity.current_status != OpportunityStatus::Active {
                continue;
            }
            if let Some(group) = groups.iter_mut().find(|g| g.value == opportunity.current_stage) {
                group.count += 1;
                group.opportunities.push(opportunity);
            }
        }
        Ok(groups)
    }

    /// Open opportunities per company region, largest first. Opportunities
    /// whose company does not resolve, or has no region, are not counted.
    pub async fn by_region(&self, opportunity_type: Option<&str>) -> CrmResult<Vec<RegionCount>> {
        let (opportunities, companies) = tokio::try_join!(
            self.readers.opportunities.opportunities(),
            self.readers.companies.companies(),
        )?;

        let index = CompanyIndex::build(&companies);
        let regions: HashMap<&CompanyId, &str> = companies
            .iter()
            .filter(|c| !c.region.trim().is_empty())
            .map(|c| (&c.company_id, c.region.trim()))
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for opportunity in &opportunities {
            if opportunity_type.is_some_and(|t| opportunity.opportunity_type != t) {
                continue;
            }
            let region = index
                .resolve(&opportunity.customer_company)
                .and_then(|id| regions.get(id));
            if let Some(region) = region {
                *counts.entry(*region).or_default() += 1;
            }
        }

        let mut listed: Vec<RegionCount> = counts
            .into_iter()
            .map(|(region, count)| RegionCount {
                region: region.to_string(),
                count,
            })
            .collect();
        listed.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.region.cmp(&b.region)));
        Ok(listed)
    }
}
