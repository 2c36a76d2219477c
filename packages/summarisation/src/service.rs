//! Orchestration service used by the CLI layer.
//!
//! Owns settings, the model provider, the optional summary cache, and the
//! prepared dataset context. The dataset is constructed explicitly by the
//! caller (see [`load_prepared_data`]) so its lifecycle stays with the
//! orchestration layer rather than in process-wide state.

use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{data_fingerprint, SummaryCache};
use crate::error::Result;
use crate::ingestion::{load_consultation_csv, load_section_mapping};
use crate::llm::LlmProvider;
use crate::pipeline::{summarise_organisation, summarise_question};
use crate::processing::{
    list_organisations, organisation_catalog, prepare_data, question_options, question_slice,
};
use crate::types::config::Settings;
use crate::types::record::PreparedData;
use crate::types::summary::{OrganisationSummary, QuestionSummary};

/// Load and preprocess the source dataset described by the settings.
pub fn load_prepared_data(settings: &Settings) -> Result<PreparedData> {
    let consultation_data = load_consultation_csv(&settings.data_path)?;
    let section_mapping = load_section_mapping(
        &consultation_data.columns,
        Some(settings.section_mapping_path.as_path()),
    );

    let prepared = prepare_data(
        consultation_data,
        settings.prompt_excerpt_chars,
        &section_mapping,
    )?;

    info!(
        questions = prepared.questions.len(),
        records = prepared.response_records.len(),
        "dataset prepared"
    );

    Ok(prepared)
}

/// The application service behind the CLI commands.
pub struct ConsultationService {
    settings: Settings,
    llm: Box<dyn LlmProvider>,
    cache: Option<SummaryCache>,
    prepared: PreparedData,
}

impl ConsultationService {
    /// Assemble the service from explicitly constructed parts.
    pub fn new(
        settings: Settings,
        llm: Box<dyn LlmProvider>,
        cache: Option<SummaryCache>,
        prepared: PreparedData,
    ) -> Self {
        Self {
            settings,
            llm,
            cache,
            prepared,
        }
    }

    /// Expose immutable runtime settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Expose the prepared dataset context.
    pub fn prepared(&self) -> &PreparedData {
        &self.prepared
    }

    /// Selectable organisation options for clients.
    pub fn list_organisations(&self) -> Vec<(String, String)> {
        list_organisations(&self.prepared)
    }

    /// Selectable question options for clients.
    pub fn list_questions(&self) -> Vec<(String, String)> {
        question_options(&self.prepared)
    }

    /// Generate or load a cached Approach 1 organisation summary.
    pub async fn summarise_organisation(
        &self,
        response_id: &str,
        use_cache: bool,
    ) -> Result<OrganisationSummary> {
        let cache_key = self.cache_key("approach_1", response_id);

        if use_cache {
            if let Some(payload) = self.cache_get(&cache_key).await? {
                if let Ok(result) = serde_json::from_value::<OrganisationSummary>(payload) {
                    debug!(response_id, "organisation summary served from cache");
                    return Ok(result);
                }
            }
        }

        let catalog = organisation_catalog(&self.prepared, response_id)?;
        let result =
            summarise_organisation(self.llm.as_ref(), &self.settings, &catalog).await?;

        self.cache_set(&cache_key, serde_json::to_value(&result)?)
            .await?;
        Ok(result)
    }

    /// Generate or load a cached Approach 2 question summary.
    pub async fn summarise_question(
        &self,
        question_id: &str,
        use_cache: bool,
    ) -> Result<QuestionSummary> {
        let cache_key = self.cache_key("approach_2", question_id);

        if use_cache {
            if let Some(payload) = self.cache_get(&cache_key).await? {
                if let Ok(result) = serde_json::from_value::<QuestionSummary>(payload) {
                    debug!(question_id, "question summary served from cache");
                    return Ok(result);
                }
            }
        }

        let slice = question_slice(&self.prepared, question_id)?;
        let total_organisations = {
            let ids: std::collections::HashSet<&str> = self
                .prepared
                .response_records
                .iter()
                .map(|record| record.response_id.as_str())
                .collect();
            ids.len()
        };

        let result = summarise_question(
            self.llm.as_ref(),
            &self.settings,
            &slice,
            total_organisations,
        )
        .await?;

        self.cache_set(&cache_key, serde_json::to_value(&result)?)
            .await?;
        Ok(result)
    }

    fn cache_key(&self, approach: &str, target_id: &str) -> String {
        SummaryCache::make_key(
            approach,
            target_id,
            self.settings.model_identity(),
            &data_fingerprint(&self.settings.data_path),
        )
    }

    async fn cache_get(&self, cache_key: &str) -> Result<Option<Value>> {
        match &self.cache {
            Some(cache) => Ok(cache.get(cache_key).await?),
            None => Ok(None),
        }
    }

    async fn cache_set(&self, cache_key: &str, payload: Value) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.set(cache_key, &payload).await?;
        }
        Ok(())
    }
}
