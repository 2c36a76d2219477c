//! Runtime configuration loaded from environment variables.
//!
//! `.env` loading is the binary's responsibility (dotenvy in the CLI);
//! this module only reads the process environment.

use std::path::PathBuf;

/// Runtime settings for the summarisation service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the consultation responses CSV
    pub data_path: PathBuf,

    /// Optional path to the question-to-section mapping CSV
    pub section_mapping_path: PathBuf,

    /// SQLite cache file path
    pub cache_path: PathBuf,

    /// Whether summary caching is enabled
    pub cache_enabled: bool,

    /// Provider selector: `openai` or `azure`
    pub llm_provider: String,

    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,

    pub azure_openai_endpoint: String,
    pub azure_openai_api_version: String,
    pub azure_openai_deployment: String,
    pub azure_openai_api_key: String,

    /// Per-request timeout in seconds
    pub llm_timeout_seconds: u64,

    /// Retries after the first attempt for transient failures
    pub llm_max_retries: u32,

    /// Maximum per-response excerpt length for prompts and evidence display
    pub prompt_excerpt_chars: usize,

    /// Below this many covered records, flag `low_sample_size`
    pub low_sample_threshold: usize,

    /// At or above this missingness ratio, flag `high_missingness`
    pub high_missingness_threshold: f64,

    pub input_cost_per_1k_tokens: f64,
    pub output_cost_per_1k_tokens: f64,
}

impl Settings {
    /// Build settings from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self {
            data_path: PathBuf::from(env_or("DATA_CSV_PATH", "data/data.csv")),
            section_mapping_path: PathBuf::from(env_or(
                "SECTION_MAPPING_PATH",
                "data/section-mapping.csv",
            )),
            cache_path: PathBuf::from(env_or("CACHE_PATH", ".cache/summaries.sqlite")),
            cache_enabled: env_or("CACHE_ENABLED", "true").trim().to_lowercase() != "false",
            llm_provider: env_or("LLM_PROVIDER", "openai").trim().to_lowercase(),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_model: env_or("OPENAI_MODEL", "gpt-4.1-mini"),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok().filter(|v| !v.is_empty()),
            azure_openai_endpoint: env_or("AZURE_OPENAI_ENDPOINT", "").trim().to_string(),
            azure_openai_api_version: env_or("AZURE_OPENAI_API_VERSION", "2024-06-01"),
            azure_openai_deployment: env_or("AZURE_OPENAI_DEPLOYMENT", "").trim().to_string(),
            azure_openai_api_key: env_or("AZURE_OPENAI_API_KEY", "").trim().to_string(),
            llm_timeout_seconds: env_parsed("LLM_TIMEOUT_SECONDS", 300),
            llm_max_retries: env_parsed("LLM_MAX_RETRIES", 2),
            prompt_excerpt_chars: env_parsed("PROMPT_EXCERPT_CHARS", 280),
            low_sample_threshold: env_parsed("LOW_SAMPLE_THRESHOLD", 8),
            high_missingness_threshold: env_parsed("HIGH_MISSINGNESS_THRESHOLD", 0.35),
            input_cost_per_1k_tokens: env_parsed("INPUT_COST_PER_1K_TOKENS", 0.0008),
            output_cost_per_1k_tokens: env_parsed("OUTPUT_COST_PER_1K_TOKENS", 0.0032),
        }
    }

    /// Active model/deployment identity used for cache keying.
    pub fn model_identity(&self) -> &str {
        if self.llm_provider == "azure" && !self.azure_openai_deployment.is_empty() {
            &self.azure_openai_deployment
        } else {
            &self.openai_model
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_identity_prefers_azure_deployment() {
        let mut settings = Settings::from_env();
        settings.llm_provider = "azure".to_string();
        settings.azure_openai_deployment = "my-deployment".to_string();
        settings.openai_model = "gpt-4.1-mini".to_string();
        assert_eq!(settings.model_identity(), "my-deployment");

        settings.azure_openai_deployment.clear();
        assert_eq!(settings.model_identity(), "gpt-4.1-mini");
    }
}
