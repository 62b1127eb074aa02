//! Bot configuration loaded from the environment.
//!
//! The gateway loads `.env` via dotenvy before constructing this. Change
//! behavior without code edits.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | BRENDA_DATA_DIR | ./data/brenda_memory | sled database directory for user profiles. |
//! | BRENDA_CATALOG_DB | ./data/catalog.db | SQLite catalog database path. |
//! | BRENDA_LLM_API_KEY | (unset) | Bearer key for the chat-completion provider; LLM path disabled when unset. |
//! | BRENDA_LLM_BASE_URL | https://openrouter.ai/api/v1 | OpenAI-compatible completion endpoint. |
//! | BRENDA_LLM_MODEL | meta-llama/llama-3.3-70b-instruct | Model identifier. |
//! | BRENDA_TURN_TIMEOUT_SECS | 30 | End-to-end budget per inbound event. |
//! | BRENDA_TOOL_TIMEOUT_SECS | 8 | Per-tool execution budget. |
//! | BRENDA_LLM_TIMEOUT_SECS | 20 | Completion budget; on expiry the composer falls back to tool output. |
//! | BRENDA_SMTP_HOST / _USER / _PASS | (unset) | SMTP relay for the advisor email. |
//! | BRENDA_ADVISOR_EMAIL | (unset) | Destination address for advisor handoffs. |
//! | BRENDA_CAMPAIGN_MAP | (unset) | Optional TOML file overriding the campaign resolution table. |

use serde::{Deserialize, Serialize};

fn default_data_dir() -> String {
    "./data/brenda_memory".to_string()
}

fn default_catalog_db() -> String {
    "./data/catalog.db".to_string()
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_model() -> String {
    "meta-llama/llama-3.3-70b-instruct".to_string()
}

fn default_turn_timeout() -> u64 {
    30
}

fn default_tool_timeout() -> u64 {
    8
}

fn default_llm_timeout() -> u64 {
    20
}

fn default_max_completion_tokens() -> u32 {
    700
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_catalog_db")]
    pub catalog_db: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub advisor_email: Option<String>,
    #[serde(default)]
    pub campaign_map_path: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalog_db: default_catalog_db(),
            llm_api_key: None,
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            turn_timeout_secs: default_turn_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            llm_timeout_secs: default_llm_timeout(),
            max_completion_tokens: default_max_completion_tokens(),
            smtp_host: None,
            smtp_user: None,
            smtp_pass: None,
            advisor_email: None,
            campaign_map_path: None,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

impl BotConfig {
    /// Builds a config from `BRENDA_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            data_dir: env_opt("BRENDA_DATA_DIR").unwrap_or_else(default_data_dir),
            catalog_db: env_opt("BRENDA_CATALOG_DB").unwrap_or_else(default_catalog_db),
            llm_api_key: env_opt("BRENDA_LLM_API_KEY"),
            llm_base_url: env_opt("BRENDA_LLM_BASE_URL").unwrap_or_else(default_llm_base_url),
            llm_model: env_opt("BRENDA_LLM_MODEL").unwrap_or_else(default_llm_model),
            turn_timeout_secs: env_u64("BRENDA_TURN_TIMEOUT_SECS", default_turn_timeout()),
            tool_timeout_secs: env_u64("BRENDA_TOOL_TIMEOUT_SECS", default_tool_timeout()),
            llm_timeout_secs: env_u64("BRENDA_LLM_TIMEOUT_SECS", default_llm_timeout()),
            max_completion_tokens: env_u64("BRENDA_MAX_COMPLETION_TOKENS", default_max_completion_tokens() as u64)
                as u32,
            smtp_host: env_opt("BRENDA_SMTP_HOST"),
            smtp_user: env_opt("BRENDA_SMTP_USER"),
            smtp_pass: env_opt("BRENDA_SMTP_PASS"),
            advisor_email: env_opt("BRENDA_ADVISOR_EMAIL"),
            campaign_map_path: env_opt("BRENDA_CAMPAIGN_MAP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.turn_timeout_secs, 30);
        assert!(cfg.llm_api_key.is_none());
        assert!(cfg.llm_base_url.starts_with("https://"));
    }
}
