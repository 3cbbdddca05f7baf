//! Name-to-id index over the company table.
//!
//! Opportunity rows carry only a company name. Every join from opportunities
//! to companies goes through this index so that spelling variants ("Acme",
//! "ACME Inc.") resolve to the same company id.

use std::collections::HashMap;

use sheetcrm_core::{CompanyId, OpportunityId};
use sheetcrm_parties::{Company, normalize_company_name};
use sheetcrm_sales::Opportunity;

#[derive(Debug, Clone, Default)]
pub struct CompanyIndex {
    by_key: HashMap<String, CompanyId>,
    names: HashMap<CompanyId, String>,
}

impl CompanyIndex {
    /// First company wins when two rows share a natural key.
    pub fn build(companies: &[Company]) -> Self {
        let mut index = Self::default();
        for company in companies {
            let key = company.natural_key();
            if key.is_empty() || index.by_key.contains_key(&key) {
                continue;
            }
            index.by_key.insert(key, company.company_id.clone());
            index
                .names
                .insert(company.company_id.clone(), company.company_name.clone());
        }
        index
    }

    pub fn resolve(&self, company_name: &str) -> Option<&CompanyId> {
        self.by_key.get(&normalize_company_name(company_name))
    }

    /// Name as written on the company row.
    pub fn canonical_name(&self, id: &CompanyId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Company of each opportunity whose name resolves.
    pub fn opportunity_companies<'a>(
        &'a self,
        opportunities: &'a [Opportunity],
    ) -> HashMap<&'a OpportunityId, &'a CompanyId> {
        opportunities
            .iter()
            .filter_map(|o| self.resolve(&o.customer_company).map(|c| (&o.opportunity_id, c)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcrm_parties::company::columns;

    fn company(id: &str, name: &str) -> Company {
        let mut row = vec![String::new(); columns::COUNT];
        row[columns::ID] = id.to_string();
        row[columns::NAME] = name.to_string();
        Company::from_row(&row, 2)
    }

    #[test]
    fn spelling_variants_resolve_to_one_id() {
        let index = CompanyIndex::build(&[company("COMP1", "Acme Co., Ltd."), company("COMP2", "Beta")]);
        let acme = CompanyId::new("COMP1");
        assert_eq!(index.resolve("ACME"), Some(&acme));
        assert_eq!(index.resolve(" acme (Taipei branch) "), Some(&acme));
        assert_eq!(index.resolve("Gamma"), None);
        assert_eq!(index.canonical_name(&acme), Some("Acme Co., Ltd."));
    }

    #[test]
    fn duplicate_keys_keep_the_first_row() {
        let index = CompanyIndex::build(&[company("COMP1", "Acme"), company("COMP9", "ACME Inc")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve("acme"), Some(&CompanyId::new("COMP1")));
    }
}
