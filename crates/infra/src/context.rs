//! Wiring of one CRM instance: store, cache, readers, writers, services.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use sheetcrm_core::CrmConfig;

use crate::cache::RangeCache;
use crate::error::StoreError;
use crate::readers::Readers;
use crate::services::{CompanyService, PipelineService, SalesAnalysisService};
use crate::store::{HttpSheetStore, HttpStoreConfig, InMemorySheetStore, SheetStore};
use crate::workflow::WorkflowService;
use crate::writers::Writers;

/// Every component of one instance, sharing a single cache.
#[derive(Clone)]
pub struct CrmServices {
    pub config: Arc<CrmConfig>,
    pub cache: Arc<RangeCache>,
    pub readers: Readers,
    pub writers: Writers,
    pub companies: CompanyService,
    pub pipeline: PipelineService,
    pub sales: SalesAnalysisService,
    pub workflows: WorkflowService,
}

impl CrmServices {
    pub fn new(store: Arc<dyn SheetStore>, config: CrmConfig) -> Self {
        let config = Arc::new(config);
        let cache = Arc::new(RangeCache::new(store));
        let readers = Readers::new(cache.clone(), config.clone());
        let writers = Writers::new(cache.clone(), config.clone(), &readers);

        info!(instance = %cache.instance_id(), "crm services wired");
        Self {
            companies: CompanyService::new(config.clone(), readers.clone(), writers.clone()),
            pipeline: PipelineService::new(config.clone(), readers.clone()),
            sales: SalesAnalysisService::new(config.clone(), readers.clone()),
            workflows: WorkflowService::new(config.clone(), readers.clone(), writers.clone()),
            config,
            cache,
            readers,
            writers,
        }
    }

    /// Dev/test wiring over an in-memory workbook.
    pub fn in_memory(store: Arc<InMemorySheetStore>, config: CrmConfig) -> Self {
        Self::new(store, config)
    }

    /// Production wiring from `SHEETCRM_*` environment variables; `None`
    /// when no spreadsheet is configured.
    pub fn from_env() -> Result<Option<Self>, StoreError> {
        let Some(http) = HttpStoreConfig::from_env() else {
            return Ok(None);
        };
        let store = HttpSheetStore::new(http)?;
        Ok(Some(Self::new(Arc::new(store), CrmConfig::from_env())))
    }

    /// Apply `peer`'s cache invalidations to this instance.
    pub fn follow(&self, peer: &CrmServices) -> JoinHandle<()> {
        self.cache.follow(peer.cache.subscribe())
    }
}
