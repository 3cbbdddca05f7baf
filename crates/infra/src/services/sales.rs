use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use sheetcrm_core::CrmConfig;
use sheetcrm_sales::{SalesAnalysis, SalesWindow, analyze};

use crate::error::CrmResult;
use crate::readers::Readers;

/// Won-deal analysis over the live opportunity table.
#[derive(Clone)]
pub struct SalesAnalysisService {
    config: Arc<CrmConfig>,
    readers: Readers,
}

impl SalesAnalysisService {
    pub fn new(config: Arc<CrmConfig>, readers: Readers) -> Self {
        Self { config, readers }
    }

    /// `start`/`end` are ISO dates or timestamps; either may be omitted.
    #[instrument(skip(self))]
    pub async fn analyze(&self, start: Option<&str>, end: Option<&str>) -> CrmResult<SalesAnalysis> {
        let window = SalesWindow::from_iso(start, end, Utc::now())?;
        let (opportunities, system) = tokio::try_join!(
            self.readers.opportunities.opportunities(),
            self.readers.system.system_config(),
        )?;
        let analysis = analyze(&opportunities, &system, &self.config, window);
        debug!(
            won = analysis.overview.total_won_deals,
            months = analysis.monthly_trend.len(),
            "sales analysis computed"
        );
        Ok(analysis)
    }
}
