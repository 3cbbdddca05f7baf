use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use sheetcrm_core::{CompanyId, CrmConfig, DomainError, Entity};
use sheetcrm_parties::{Company, CompanyPatch, NewCompany, normalize_company_name, same_company};

use super::{OpportunityWriter, Resolved};
use crate::cache::{RangeCache, keys};
use crate::error::CrmResult;
use crate::readers::{CompanyReader, ContactReader, OpportunityReader, Readers};

type Claims = Arc<StdMutex<HashMap<CompanyId, usize>>>;

fn lock_claims(claims: &Claims) -> MutexGuard<'_, HashMap<CompanyId, usize>> {
    claims.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a company as in use by a running workflow.
///
/// While any claim on a company is alive, [`CompanyWriter::delete_if_unreferenced`]
/// keeps it. Dropping the claim releases it.
#[derive(Debug)]
pub struct CompanyClaim {
    id: CompanyId,
    claims: Claims,
}

impl CompanyClaim {
    fn new(id: CompanyId, claims: Claims) -> Self {
        *lock_claims(&claims).entry(id.clone()).or_default() += 1;
        Self { id, claims }
    }
}

impl Drop for CompanyClaim {
    fn drop(&mut self) {
        let mut claims = lock_claims(&self.claims);
        if let Some(count) = claims.get_mut(&self.id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                claims.remove(&self.id);
            }
        }
    }
}

#[derive(Clone)]
pub struct CompanyWriter {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
    companies: CompanyReader,
    contacts: ContactReader,
    opportunities: OpportunityReader,
    opportunity_writer: OpportunityWriter,
    create_lock: Arc<Mutex<()>>,
    claims: Claims,
}

impl CompanyWriter {
    pub fn new(
        cache: Arc<RangeCache>,
        config: Arc<CrmConfig>,
        readers: &Readers,
        opportunity_writer: OpportunityWriter,
    ) -> Self {
        Self {
            cache,
            config,
            companies: readers.companies.clone(),
            contacts: readers.contacts.clone(),
            opportunities: readers.opportunities.clone(),
            opportunity_writer,
            create_lock: Arc::new(Mutex::new(())),
            claims: Claims::default(),
        }
    }

    fn table(&self) -> &str {
        &self.config.tables.companies
    }

    /// Company with the same normalized name, or a new row.
    ///
    /// Calls are serialized within this process. The lookup bypasses the
    /// cached read so a row another instance appended is found.
    pub async fn get_or_create(&self, new: NewCompany, modifier: &str) -> CrmResult<Resolved<Company>> {
        let (resolved, _claim) = self.get_or_create_claimed(new, modifier).await?;
        Ok(resolved)
    }

    /// [`get_or_create`](Self::get_or_create), also claiming the company
    /// before the create lock is released.
    #[instrument(skip(self, new), fields(company = %new.name))]
    pub async fn get_or_create_claimed(
        &self,
        new: NewCompany,
        modifier: &str,
    ) -> CrmResult<(Resolved<Company>, CompanyClaim)> {
        if normalize_company_name(&new.name).is_empty() {
            return Err(DomainError::missing_field("company name").into());
        }

        let _guard = self.create_lock.lock().await;
        self.cache.invalidate_local(keys::COMPANIES);
        if let Some(existing) = self.companies.find_by_name(&new.name).await? {
            let claim = self.claim(&existing.company_id);
            return Ok((Resolved::existing(existing), claim));
        }

        let now = Utc::now();
        let mut company = new.into_company(CompanyId::generate(now), modifier, now)?;
        let outcome = self
            .cache
            .store()
            .append_row(self.table(), company.to_row())
            .await?;
        company.row_index = outcome.row_index;
        self.cache.invalidate(keys::COMPANIES);

        info!(company_id = %company.company_id, row_index = company.row_index, "company created");
        let claim = self.claim(&company.company_id);
        Ok((Resolved::created(company), claim))
    }

    fn claim(&self, id: &CompanyId) -> CompanyClaim {
        CompanyClaim::new(id.clone(), self.claims.clone())
    }

    /// Delete the claimed company unless it is still needed: another claim
    /// is alive, or an opportunity or contact references it. Dependents are
    /// read fresh from the store. Returns whether the row was deleted.
    #[instrument(skip(self, claim), fields(company_id = %claim.id))]
    pub async fn delete_if_unreferenced(&self, claim: CompanyClaim) -> CrmResult<bool> {
        let _guard = self.create_lock.lock().await;
        let id = claim.id.clone();
        drop(claim);

        let others = lock_claims(&self.claims).get(&id).copied().unwrap_or(0);
        if others > 0 {
            warn!(company_id = %id, claims = others, "company kept: claimed by a running workflow");
            return Ok(false);
        }

        for key in [keys::COMPANIES, keys::OPPORTUNITIES, keys::CONTACTS] {
            self.cache.invalidate_local(key);
        }
        let (company, opportunities, contacts) = tokio::try_join!(
            self.companies.find_by_id(&id),
            self.opportunities.all(),
            self.contacts.contacts(),
        )?;
        let Some(company) = company else {
            return Ok(false);
        };

        let opportunity_refs = opportunities
            .iter()
            .filter(|o| same_company(&o.customer_company, &company.company_name))
            .count();
        let contact_refs = contacts
            .iter()
            .filter(|c| c.company_id.as_ref() == Some(&id))
            .count();
        if opportunity_refs + contact_refs > 0 {
            warn!(
                company_id = %id,
                opportunities = opportunity_refs,
                contacts = contact_refs,
                "company kept: still referenced"
            );
            return Ok(false);
        }

        self.remove(&company).await?;
        Ok(true)
    }

    /// Apply `patch` to the company with this id.
    ///
    /// A rename must not collide with another company's natural key; it also
    /// rewrites the company name on every opportunity that resolved to the
    /// old name.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &CompanyId, patch: &CompanyPatch, modifier: &str) -> CrmResult<Company> {
        let mut company = self
            .companies
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("company {id}")))?;
        let old_name = company.company_name.clone();

        patch.apply(&mut company, modifier, Utc::now())?;

        let renamed = company.company_name != old_name;
        if renamed {
            let key = company.natural_key();
            let clash = self
                .companies
                .companies()
                .await?
                .iter()
                .any(|c| c.company_id != *id && c.natural_key() == key);
            if clash {
                return Err(DomainError::duplicate(format!("company {}", company.company_name)).into());
            }
        }

        self.cache
            .store()
            .update_row(self.table(), company.row_index(), company.to_row())
            .await?;
        self.cache.invalidate(keys::COMPANIES);
        info!(company_id = %id, "company updated");

        if renamed {
            self.rename_opportunities(&old_name, &company.company_name, modifier).await?;
        }
        Ok(company)
    }

    async fn rename_opportunities(&self, old_name: &str, new_name: &str, modifier: &str) -> CrmResult<usize> {
        let stale: Vec<_> = self
            .opportunities
            .all()
            .await?
            .iter()
            .filter(|o| same_company(&o.customer_company, old_name))
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.opportunity_writer.set_company_name(stale, new_name, modifier).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &CompanyId) -> CrmResult<()> {
        let company = self
            .companies
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("company {id}")))?;
        self.remove(&company).await
    }

    #[instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) -> CrmResult<()> {
        let company = self
            .companies
            .find_by_name(name)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("company {name}")))?;
        self.remove(&company).await
    }

    async fn remove(&self, company: &Company) -> CrmResult<()> {
        self.cache
            .store()
            .delete_row(self.table(), company.row_index)
            .await?;
        self.cache.invalidate(keys::COMPANIES);
        info!(company_id = %company.company_id, row_index = company.row_index, "company deleted");
        Ok(())
    }
}
