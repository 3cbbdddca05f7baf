use std::sync::Arc;

use sheetcrm_core::system_config::columns;
use sheetcrm_core::{CrmConfig, SystemConfig};

use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

/// The SystemConfig option sets.
#[derive(Clone)]
pub struct SystemReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl SystemReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    pub async fn system_config(&self) -> Result<Arc<SystemConfig>, StoreError> {
        let range = RowRange::new(&self.config.tables.system_config, columns::LAST);
        self.cache
            .get_or_fetch(keys::SYSTEM_CONFIG, &range, |rows| SystemConfig::from_rows(&rows))
            .await
    }

    /// Value of the first configured pipeline stage, or the fallback stage.
    pub async fn default_stage(&self) -> Result<String, StoreError> {
        let system = self.system_config().await?;
        let stage = system
            .first_value(&self.config.categories.opportunity_stage)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.pipeline.fallback_stage.clone());
        Ok(stage)
    }
}
