//! Company rules: activity roll-up, details view, audited update and the
//! dependency-checked delete.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use sheetcrm_activity::{EventLog, InteractionSubject, NewInteraction};
use sheetcrm_core::{CompanyId, CrmConfig, DomainError, OpportunityId, SystemConfig};
use sheetcrm_parties::{Company, CompanyPatch, Contact, RawLead, normalize_company_name};
use sheetcrm_sales::Opportunity;

use super::CompanyIndex;
use crate::error::CrmResult;
use crate::readers::{Readers, newest_first};
use crate::writers::Writers;

/// A company with its derived activity figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyActivity {
    #[serde(flatten)]
    pub company: Company,
    pub last_activity: Option<DateTime<Utc>>,
    pub opportunity_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityActivity {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub effective_last_activity: Option<DateTime<Utc>>,
}

/// A name known only from raw leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialCompany {
    pub company_name: String,
    pub is_potential: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompanyInfo {
    Formal(Company),
    Potential(PotentialCompany),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub company_info: CompanyInfo,
    pub contacts: Vec<Contact>,
    pub opportunities: Vec<OpportunityActivity>,
    pub potential_contacts: Vec<RawLead>,
    pub event_logs: Vec<EventLog>,
}

impl CompanyDetails {
    pub fn is_potential(&self) -> bool {
        matches!(self.company_info, CompanyInfo::Potential(_))
    }
}

fn later(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Clone)]
pub struct CompanyService {
    config: Arc<CrmConfig>,
    readers: Readers,
    writers: Writers,
}

impl CompanyService {
    pub fn new(config: Arc<CrmConfig>, readers: Readers, writers: Writers) -> Self {
        Self {
            config,
            readers,
            writers,
        }
    }

    /// Every company with its last activity and open-opportunity count,
    /// most recently active first.
    ///
    /// Last activity starts at the company's own update (or creation) time
    /// and moves forward for every interaction filed against the company
    /// directly or against one of its opportunities.
    pub async fn list_with_activity(&self) -> CrmResult<Vec<CompanyActivity>> {
        let (companies, interactions, opportunities) = tokio::try_join!(
            self.readers.companies.companies(),
            self.readers.interactions.interactions(),
            self.readers.opportunities.opportunities(),
        )?;

        let index = CompanyIndex::build(&companies);
        let mut activity: HashMap<&CompanyId, Option<DateTime<Utc>>> = companies
            .iter()
            .map(|c| (&c.company_id, c.self_activity()))
            .collect();
        let mut counts: HashMap<&CompanyId, usize> = HashMap::new();

        let opportunity_company = index.opportunity_companies(&opportunities);
        for opportunity in opportunities.iter().filter(|o| o.is_live()) {
            if let Some(company_id) = opportunity_company.get(&opportunity.opportunity_id) {
                *counts.entry(*company_id).or_default() += 1;
            }
        }

        for interaction in interactions.iter() {
            let company_id = interaction
                .company_id
                .as_ref()
                .filter(|id| activity.contains_key(id))
                .or_else(|| {
                    interaction
                        .opportunity_id
                        .as_ref()
                        .and_then(|o| opportunity_company.get(o).copied())
                });
            if let Some(slot) = company_id.and_then(|id| activity.get_mut(id)) {
                *slot = later(*slot, interaction.occurred_at());
            }
        }

        let mut listed: Vec<CompanyActivity> = companies
            .iter()
            .map(|company| CompanyActivity {
                last_activity: activity.get(&company.company_id).copied().flatten(),
                opportunity_count: counts.get(&company.company_id).copied().unwrap_or(0),
                company: company.clone(),
            })
            .collect();
        listed.sort_by(|a, b| newest_first(a.last_activity, b.last_activity));
        Ok(listed)
    }

    /// Company, its contacts, opportunities, potential contacts and event logs.
    ///
    /// A name that matches no company but does match raw leads yields the
    /// potential shape with empty relations.
    #[instrument(skip(self))]
    pub async fn details(&self, name: &str) -> CrmResult<CompanyDetails> {
        let (companies, contacts, opportunities, leads, logs, interactions) = tokio::try_join!(
            self.readers.companies.companies(),
            self.readers.contacts.contacts(),
            self.readers.opportunities.opportunities(),
            self.readers.contacts.potential_contacts(name),
            self.readers.event_logs.event_logs(),
            self.readers.interactions.interactions(),
        )?;

        let key = normalize_company_name(name);
        let Some(company) = companies.iter().find(|c| !key.is_empty() && c.natural_key() == key) else {
            let Some(first) = leads.first() else {
                return Err(DomainError::not_found(format!("company {name}")).into());
            };
            return Ok(CompanyDetails {
                company_info: CompanyInfo::Potential(PotentialCompany {
                    company_name: first.company.clone(),
                    is_potential: true,
                }),
                contacts: Vec::new(),
                opportunities: Vec::new(),
                potential_contacts: leads,
                event_logs: Vec::new(),
            });
        };

        let mut latest_interaction: HashMap<&OpportunityId, DateTime<Utc>> = HashMap::new();
        for interaction in interactions.iter() {
            if let (Some(id), Some(at)) = (&interaction.opportunity_id, interaction.occurred_at()) {
                let slot = latest_interaction.entry(id).or_insert(at);
                *slot = (*slot).max(at);
            }
        }

        let index = CompanyIndex::build(&companies);
        let related: Vec<OpportunityActivity> = opportunities
            .iter()
            .filter(|o| index.resolve(&o.customer_company) == Some(&company.company_id))
            .map(|o| OpportunityActivity {
                effective_last_activity: later(
                    o.self_activity(),
                    latest_interaction.get(&o.opportunity_id).copied(),
                ),
                opportunity: o.clone(),
            })
            .collect();

        Ok(CompanyDetails {
            company_info: CompanyInfo::Formal(company.clone()),
            contacts: contacts
                .iter()
                .filter(|c| c.company_id.as_ref() == Some(&company.company_id))
                .cloned()
                .collect(),
            opportunities: related,
            potential_contacts: leads,
            event_logs: logs
                .iter()
                .filter(|log| log.company_id.as_ref() == Some(&company.company_id))
                .cloned()
                .collect(),
        })
    }

    /// Update the named company and record one audit interaction listing
    /// the changes to its stage, rating and type.
    ///
    /// Nothing is recorded when the update fails or none of those three
    /// fields changed. A failed audit write is logged, not returned.
    #[instrument(skip(self, patch))]
    pub async fn update_company(&self, name: &str, patch: &CompanyPatch, modifier: &str) -> CrmResult<Company> {
        let (original, system) = tokio::try_join!(
            self.readers.companies.find_by_name(name),
            self.readers.system.system_config(),
        )?;
        let original = original.ok_or_else(|| DomainError::not_found(format!("company {name}")))?;

        let changes = self.describe_changes(&original, patch, &system);
        let updated = self
            .writers
            .companies
            .update(&original.company_id, patch, modifier)
            .await?;

        if !changes.is_empty() {
            self.record(&original.company_id, "Company updated", changes.join("; "), modifier)
                .await;
        }
        Ok(updated)
    }

    fn describe_changes(&self, original: &Company, patch: &CompanyPatch, system: &SystemConfig) -> Vec<String> {
        let categories = &self.config.categories;
        let monitored = [
            ("Customer stage", &categories.customer_stage, &original.customer_stage, &patch.customer_stage),
            (
                "Engagement rating",
                &categories.engagement_rating,
                &original.engagement_rating,
                &patch.engagement_rating,
            ),
            ("Company type", &categories.company_type, &original.company_type, &patch.company_type),
        ];

        monitored
            .into_iter()
            .filter_map(|(field, category, old, new)| {
                let new = new.as_ref().filter(|new| *new != old)?;
                Some(format!(
                    "{field} changed from [{}] to [{}]",
                    system.label(category, old),
                    system.label(category, new),
                ))
            })
            .collect()
    }

    /// Delete the named company unless opportunities or company-level event
    /// logs still reference it.
    #[instrument(skip(self))]
    pub async fn delete_company(&self, name: &str, modifier: &str) -> CrmResult<()> {
        let (companies, opportunities, logs) = tokio::try_join!(
            self.readers.companies.companies(),
            self.readers.opportunities.opportunities(),
            self.readers.event_logs.event_logs(),
        )?;

        let key = normalize_company_name(name);
        let company = companies
            .iter()
            .find(|c| !key.is_empty() && c.natural_key() == key)
            .ok_or_else(|| DomainError::not_found(format!("company {name}")))?;

        let index = CompanyIndex::build(&companies);
        let blocking: Vec<&Opportunity> = opportunities
            .iter()
            .filter(|o| index.resolve(&o.customer_company) == Some(&company.company_id))
            .collect();
        if let Some(first) = blocking.first() {
            warn!(company = %company.company_name, count = blocking.len(), "delete refused: opportunities remain");
            return Err(DomainError::delete_refused(format!(
                "company {} still has {} opportunities (e.g. \"{}\"); delete or move them first",
                company.company_name,
                blocking.len(),
                first.opportunity_name,
            ))
            .into());
        }

        let scoped = logs
            .iter()
            .filter(|log| log.is_company_scoped(&company.company_id))
            .count();
        if scoped > 0 {
            warn!(company = %company.company_name, count = scoped, "delete refused: event logs remain");
            return Err(DomainError::delete_refused(format!(
                "company {} still has {scoped} event logs; resolve them first",
                company.company_name,
            ))
            .into());
        }

        self.record(
            &company.company_id,
            "Company deleted",
            format!(
                "Company {} ({}) deletion requested by {modifier}",
                company.company_name, company.company_id
            ),
            modifier,
        )
        .await;

        self.writers.companies.delete(&company.company_id).await?;
        info!(company = %company.company_name, "company deleted");
        Ok(())
    }

    /// Rewrite opportunity company names that resolve to a company but are
    /// spelled differently from it. Returns the number of rows rewritten.
    #[instrument(skip(self))]
    pub async fn backfill_company_names(&self, modifier: &str) -> CrmResult<usize> {
        let (companies, opportunities) = tokio::try_join!(
            self.readers.companies.companies(),
            self.readers.opportunities.all(),
        )?;
        let index = CompanyIndex::build(&companies);

        let mut stale: HashMap<&str, Vec<Opportunity>> = HashMap::new();
        for opportunity in opportunities.iter() {
            let canonical = index
                .resolve(&opportunity.customer_company)
                .and_then(|id| index.canonical_name(id));
            if let Some(canonical) = canonical.filter(|c| *c != opportunity.customer_company) {
                stale.entry(canonical).or_default().push(opportunity.clone());
            }
        }

        let mut rewritten = 0;
        for (canonical, rows) in stale {
            rewritten += self
                .writers
                .opportunities
                .set_company_name(rows, canonical, modifier)
                .await?;
        }
        info!(rewritten, "company names backfilled");
        Ok(rewritten)
    }

    /// Best-effort company-level audit interaction.
    async fn record(&self, company_id: &CompanyId, title: &str, summary: String, modifier: &str) {
        let new = NewInteraction::new(
            InteractionSubject::Company(company_id.clone()),
            self.config.pipeline.system_event_type.clone(),
            title,
            summary,
            modifier,
        );
        if let Err(err) = self.writers.interactions.create(new).await {
            warn!(%company_id, error = %err, "company audit interaction not recorded");
        }
    }
}
