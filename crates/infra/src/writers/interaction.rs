use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use sheetcrm_activity::{Interaction, NewInteraction};
use sheetcrm_core::{CrmConfig, DomainError, InteractionId};

use crate::cache::{RangeCache, keys};
use crate::error::CrmResult;
use crate::readers::{InteractionReader, Readers};

#[derive(Clone)]
pub struct InteractionWriter {
    cache: Arc<RangeCache>,
    config: Arc<CrmConfig>,
    interactions: InteractionReader,
}

impl InteractionWriter {
    pub fn new(cache: Arc<RangeCache>, config: Arc<CrmConfig>, readers: &Readers) -> Self {
        Self {
            cache,
            config,
            interactions: readers.interactions.clone(),
        }
    }

    #[instrument(skip(self, new), fields(title = %new.event_title))]
    pub async fn create(&self, new: NewInteraction) -> CrmResult<Interaction> {
        let mut interaction = new.into_interaction(InteractionId::generate(), Utc::now())?;
        let outcome = self
            .cache
            .store()
            .append_row(&self.config.tables.interactions, interaction.to_row())
            .await?;
        interaction.row_index = outcome.row_index;
        self.cache.invalidate(keys::INTERACTIONS);
        info!(interaction_id = %interaction.interaction_id, "interaction recorded");
        Ok(interaction)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &InteractionId) -> CrmResult<()> {
        let interaction = self
            .interactions
            .interactions()
            .await?
            .iter()
            .find(|i| i.interaction_id == *id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("interaction {id}")))?;
        self.cache
            .store()
            .delete_row(&self.config.tables.interactions, interaction.row_index)
            .await?;
        self.cache.invalidate(keys::INTERACTIONS);
        info!(interaction_id = %id, "interaction deleted");
        Ok(())
    }
}
