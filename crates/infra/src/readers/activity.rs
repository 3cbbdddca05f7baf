use std::sync::Arc;

use sheetcrm_activity::{EventLog, Interaction, InteractionSubject, event_log, interaction};
use sheetcrm_core::{CompanyId, CrmConfig};

use super::newest_first;
use crate::cache::{RangeCache, keys};
use crate::error::StoreError;
use crate::store::RowRange;

/// Interactions, most recent first.
#[derive(Clone)]
pub struct InteractionReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl InteractionReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    pub async fn interactions(&self) -> Result<Arc<Vec<Interaction>>, StoreError> {
        let range = RowRange::new(&self.config.tables.interactions, interaction::columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::INTERACTIONS,
                &range,
                |row, handle| {
                    let interaction = Interaction::from_row(row, handle);
                    (!interaction.interaction_id.is_empty()).then_some(interaction)
                },
                |a, b| newest_first(a.occurred_at(), b.occurred_at()),
            )
            .await
    }

    pub async fn about(&self, subject: &InteractionSubject) -> Result<Vec<Interaction>, StoreError> {
        Ok(self
            .interactions()
            .await?
            .iter()
            .filter(|i| i.is_about(subject))
            .cloned()
            .collect())
    }
}

/// Event logs, most recently modified first.
#[derive(Clone)]
pub struct EventLogReader {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
}

impl EventLogReader {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>) -> Self {
        Self { cache, config }
    }

    pub async fn event_logs(&self) -> Result<Arc<Vec<EventLog>>, StoreError> {
        let range = RowRange::new(&self.config.tables.event_logs, event_log::columns::LAST);
        self.cache
            .fetch_and_cache(
                keys::EVENT_LOGS,
                &range,
                |row, handle| {
                    let log = EventLog::from_row(row, handle);
                    (!log.event_id.is_empty()).then_some(log)
                },
                |a, b| newest_first(a.sort_time(), b.sort_time()),
            )
            .await
    }

    /// Logs referencing the company, with or without an opportunity.
    pub async fn for_company(&self, company_id: &CompanyId) -> Result<Vec<EventLog>, StoreError> {
        Ok(self
            .event_logs()
            .await?
            .iter()
            .filter(|log| log.company_id.as_ref() == Some(company_id))
            .cloned()
            .collect())
    }
}
