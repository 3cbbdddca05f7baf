use std::sync::Arc;

use sheetcrm_core::{CompanyId, CrmConfig};
use sheetcrm_parties::company::columns;
use sheetcrm_parties::{Company, normalize_company_name};

use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

#[derive(Clone)]
pub struct CompanyReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl CompanyReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    /// Every company, alphabetical by name.
    pub async fn companies(&self) -> Result<Arc<Vec<Company>>, StoreError> {
        let range = RowRange::new(&self.config.tables.companies, columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::COMPANIES,
                &range,
                |row, handle| {
                    let company = Company::from_row(row, handle);
                    (!company.company_id.is_empty()).then_some(company)
                },
                |a, b| a.company_name.to_lowercase().cmp(&b.company_name.to_lowercase()),
            )
            .await
    }

    /// Company whose normalized name equals the normalized `name`.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Company>, StoreError> {
        let key = normalize_company_name(name);
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .companies()
            .await?
            .iter()
            .find(|c| c.natural_key() == key)
            .cloned())
    }

    pub async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, StoreError> {
        Ok(self
            .companies()
            .await?
            .iter()
            .find(|c| c.company_id == *id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySheetStore;

    fn company_row(id: &str, name: &str) -> Vec<String> {
        let mut row = vec![String::new(); columns::COUNT];
        row[columns::ID] = id.to_string();
        row[columns::NAME] = name.to_string();
        row
    }

    #[tokio::test]
    async fn resolves_names_through_normalization() {
        let store = Arc::new(InMemorySheetStore::new());
        let config = Arc::new(CrmConfig::default());
        store.seed(
            &config.tables.companies,
            vec![
                company_row("COMP2", "Zenith Robotics"),
                vec![],
                company_row("COMP1", "Acme Ltd."),
            ],
        );
        let reader = CompanyReader::new(Arc::new(RangeCache::new(store)), config);

        let all = reader.companies().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].company_name, "Acme Ltd.");
        assert_eq!(all[0].row_index, 4);

        let found = reader.find_by_name("  ACME ").await.unwrap().unwrap();
        assert_eq!(found.company_id, CompanyId::new("COMP1"));
        assert!(reader.find_by_name("").await.unwrap().is_none());
        assert!(
            reader
                .find_by_id(&CompanyId::new("COMP2"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
