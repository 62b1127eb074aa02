//! Campaign deep-link parsing and the single owned resolution table.
//!
//! Deep-link payloads carry hashtag-style tokens, e.g.
//! `"#Experto_IA_GPT_Gemini #ADSIM_01"`. The first token naming a known
//! course tag resolves to a catalog course id; the remaining token is kept as
//! the campaign source. Matching is case-insensitive. This module is the only
//! place course tags are resolved; no other component carries its own copy of
//! the mapping.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A parsed deep-link payload: course tag plus campaign tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignTag {
    pub course_tag: String,
    pub campaign_tag: Option<String>,
}

/// Extracts hashtag tokens from a deep-link text, lowercased, `#` stripped.
fn hashtag_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.starts_with('#') && w.len() > 1)
        .map(|w| w.trim_start_matches('#').to_lowercase())
        .collect()
}

#[derive(Debug, Deserialize)]
struct CampaignMapFile {
    #[serde(default)]
    courses: HashMap<String, String>,
}

/// Course-tag -> course-id resolution table.
pub struct CampaignMap {
    courses: HashMap<String, String>,
}

impl CampaignMap {
    /// Compiled-in defaults; replaced entirely when a TOML override is given.
    pub fn builtin() -> Self {
        let mut courses = HashMap::new();
        courses.insert(
            "experto_ia_gpt_gemini".to_string(),
            "experto-ia-gpt-gemini".to_string(),
        );
        courses.insert(
            "automatizacion_ia".to_string(),
            "automatizacion-inteligente".to_string(),
        );
        courses.insert(
            "ia_para_negocios".to_string(),
            "ia-para-negocios".to_string(),
        );
        Self { courses }
    }

    /// Loads the table from a TOML file:
    ///
    /// ```toml
    /// [courses]
    /// experto_ia_gpt_gemini = "experto-ia-gpt-gemini"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("campaign map read failed: {}", e))?;
        let file: CampaignMapFile =
            toml::from_str(&raw).map_err(|e| format!("campaign map parse failed: {}", e))?;
        let courses = file
            .courses
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Ok(Self { courses })
    }

    /// Loads from the configured path when set, otherwise the builtin table.
    pub fn from_config(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::from_toml_file(p).unwrap_or_else(|e| {
                tracing::warn!("campaign map override unusable ({}); using builtin", e);
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    /// Parses a deep-link text into a [`CampaignTag`]: the first token that
    /// matches a known course tag becomes `course_tag`; the first remaining
    /// token becomes `campaign_tag`. Returns `None` when no known course tag
    /// is present.
    pub fn parse(&self, text: &str) -> Option<CampaignTag> {
        let tokens = hashtag_tokens(text);
        let course_tag = tokens.iter().find(|t| self.courses.contains_key(*t))?.clone();
        let campaign_tag = tokens.into_iter().find(|t| *t != course_tag);
        Some(CampaignTag { course_tag, campaign_tag })
    }

    /// Resolves a course tag to its catalog course id.
    pub fn resolve(&self, course_tag: &str) -> Option<&str> {
        self.courses.get(&course_tag.to_lowercase()).map(String::as_str)
    }
}
