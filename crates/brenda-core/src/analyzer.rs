//! Intent & engagement analyzer.
//!
//! Two execution modes: a single LLM call returning a strict JSON
//! [`AnalysisSnapshot`], and a keyword rule fallback used when the model is
//! unavailable or its output does not parse. The model never chooses tools;
//! it only reports categories and hints. Trait extraction merges into the
//! profile as idempotent unions, and the lead score moves by fixed deltas.

use crate::llm::{ChatMessage, LlmBridge};
use crate::profile::{EngagementLevel, MessageRecord, Role, UserProfile};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fixed intent categories shared by the analyzer and the selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Exploration,
    ObjectionPrice,
    ObjectionTime,
    ObjectionValue,
    ObjectionTrust,
    BuyingSignals,
    AutomationNeed,
    FreeResources,
    #[default]
    GeneralQuestion,
    ProfessionChange,
}

impl Intent {
    /// Tie-break rank: lower wins. BUYING_SIGNALS > OBJECTION_* >
    /// FREE_RESOURCES > AUTOMATION_NEED > EXPLORATION > GENERAL_QUESTION.
    fn priority(self) -> u8 {
        match self {
            Intent::BuyingSignals => 0,
            Intent::ObjectionPrice
            | Intent::ObjectionTime
            | Intent::ObjectionValue
            | Intent::ObjectionTrust => 1,
            Intent::FreeResources => 2,
            Intent::AutomationNeed => 3,
            Intent::Exploration => 4,
            Intent::ProfessionChange => 5,
            Intent::GeneralQuestion => 6,
        }
    }

    pub fn is_objection(self) -> bool {
        matches!(
            self,
            Intent::ObjectionPrice
                | Intent::ObjectionTime
                | Intent::ObjectionValue
                | Intent::ObjectionTrust
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    #[default]
    Neutral,
    Positive,
}

/// Transient per-turn classification attached to the latest user message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub engagement: EngagementLevel,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub challenges: BTreeSet<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub objections: BTreeSet<String>,
    #[serde(default)]
    pub buying_signals: BTreeSet<String>,
    #[serde(default)]
    pub response_style: Option<String>,
    /// Hints only; the selection policy decides on ids, never on these.
    #[serde(default)]
    pub suggested_tools: Vec<String>,
    #[serde(default)]
    pub next_focus: Option<String>,
}

// ---------------------------------------------------------------------------
// Keyword tables (rule-based fallback)
// ---------------------------------------------------------------------------

static BUYING_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "inscribirme", "inscribirse", "comprar", "pagar", "depósito", "deposito",
        "transferencia", "estoy listo", "estoy lista", "acepto", "quiero empezar",
        "dónde pago", "donde pago", "dónde deposito", "donde deposito", "me interesa",
        "cuándo empieza", "cuando empieza",
    ]
});

static PRICE_OBJECTION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "caro", "costoso", "muy caro", "precio alto", "no tengo dinero", "no me alcanza",
        "presupuesto", "descuento", "más barato", "mas barato",
    ]
});

static TIME_OBJECTION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "no tengo tiempo", "sin tiempo", "muy largo", "ocupado", "ocupada",
        "no me da tiempo", "demasiadas horas",
    ]
});

static VALUE_OBJECTION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "vale la pena", "de verdad sirve", "funciona de verdad", "no sé si sirve",
        "no se si sirve", "qué gano", "que gano", "para qué me sirve", "para que me sirve",
    ]
});

static TRUST_OBJECTION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "estafa", "confianza", "no confío", "no confio", "garantía", "garantia",
        "es seguro", "certificado", "aval",
    ]
});

static AUTOMATION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "automatizar", "automatización", "automatizacion", "procesos", "repetitivo",
        "ahorrar tiempo", "flujo de trabajo", "workflow",
    ]
});

static FREE_RESOURCE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["gratis", "gratuito", "recursos", "material", "guía", "guia", "plantilla", "template"]
});

static EXPLORATION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "qué voy a aprender", "que voy a aprender", "temario", "contenido", "syllabus",
        "de qué trata", "de que trata", "qué incluye", "que incluye", "aprender",
        "módulos", "modulos", "sesiones",
    ]
});

static PROFESSION_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "cambiar de carrera", "cambio de carrera", "nueva profesión", "nueva profesion",
        "reinventarme", "cambio profesional", "nuevo trabajo",
    ]
});

static POSITIVE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["gracias", "excelente", "genial", "me encanta", "perfecto", "interesante", "buenísimo", "buenisimo"]
});

static NEGATIVE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["caro", "malo", "no me gusta", "problema", "difícil", "dificil", "no sirve", "duda", "desconfío", "desconfio"]
});

fn count_matches(text: &str, table: &[&str]) -> usize {
    table.iter().filter(|k| text.contains(*k)).count()
}

fn collect_matches(text: &str, table: &[&str]) -> BTreeSet<String> {
    table
        .iter()
        .filter(|k| text.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Classifies each user message into an [`AnalysisSnapshot`]. Holds an
/// optional LLM bridge; without one, only the rule path runs.
pub struct Analyzer {
    llm: Option<Arc<LlmBridge>>,
}

impl Analyzer {
    pub fn new(llm: Option<Arc<LlmBridge>>) -> Self {
        Self { llm }
    }

    pub fn rules_only() -> Self {
        Self { llm: None }
    }

    /// Classifies `text` given the recent conversation window. LLM mode is
    /// preferred; any provider or parse failure falls back to the rules.
    pub async fn analyze(
        &self,
        text: &str,
        window: &[MessageRecord],
        course_name: Option<&str>,
    ) -> AnalysisSnapshot {
        if let Some(llm) = &self.llm {
            match self.analyze_with_llm(llm, text, window, course_name).await {
                Ok(snapshot) => return snapshot,
                Err(e) => {
                    tracing::warn!("analyzer llm mode failed ({}); using rule fallback", e);
                }
            }
        }
        self.analyze_with_rules(text, window)
    }

    async fn analyze_with_llm(
        &self,
        llm: &LlmBridge,
        text: &str,
        window: &[MessageRecord],
        course_name: Option<&str>,
    ) -> Result<AnalysisSnapshot, String> {
        let system = "Eres un clasificador de mensajes para un asistente de ventas. \
            Devuelve SOLO un objeto JSON con los campos: \
            sentiment (negative|neutral|positive), \
            engagement (low|medium|high|very_high), \
            intent (EXPLORATION|OBJECTION_PRICE|OBJECTION_TIME|OBJECTION_VALUE|OBJECTION_TRUST|BUYING_SIGNALS|AUTOMATION_NEED|FREE_RESOURCES|GENERAL_QUESTION|PROFESSION_CHANGE), \
            challenges (array), interests (array), objections (array), buying_signals (array), \
            response_style (string|null), suggested_tools (array), next_focus (string|null). \
            No elijas herramientas por tu cuenta; solo reporta categorías. Sin texto extra.";

        let mut context = String::new();
        if let Some(name) = course_name {
            context.push_str(&format!("Curso en conversación: {}\n", name));
        }
        for record in window.iter().rev().take(6).rev() {
            let who = match record.role {
                Role::User => "usuario",
                Role::Assistant => "asistente",
                Role::System => "sistema",
            };
            context.push_str(&format!("{}: {}\n", who, record.content));
        }
        context.push_str(&format!("Mensaje a clasificar: {}", text));

        let raw = llm
            .chat(
                vec![ChatMessage::system(system), ChatMessage::user(&context)],
                Some(0.1),
                Some(400),
            )
            .await
            .map_err(|e| e.to_string())?;

        // Tolerate fenced or prefixed output; the JSON object itself is strict.
        let start = raw.find('{').ok_or("no JSON object in analyzer output")?;
        let end = raw.rfind('}').ok_or("unterminated JSON object in analyzer output")?;
        serde_json::from_str::<AnalysisSnapshot>(&raw[start..=end]).map_err(|e| e.to_string())
    }

    /// Keyword fallback: score each intent by match count, break ties by
    /// fixed priority. Sentiment from polarity counts; engagement from
    /// message length and recent activity density.
    pub fn analyze_with_rules(&self, text: &str, window: &[MessageRecord]) -> AnalysisSnapshot {
        let lower = text.to_lowercase();

        let scored: Vec<(Intent, usize)> = vec![
            (Intent::BuyingSignals, count_matches(&lower, &BUYING_KEYWORDS)),
            (Intent::ObjectionPrice, count_matches(&lower, &PRICE_OBJECTION_KEYWORDS)),
            (Intent::ObjectionTime, count_matches(&lower, &TIME_OBJECTION_KEYWORDS)),
            (Intent::ObjectionValue, count_matches(&lower, &VALUE_OBJECTION_KEYWORDS)),
            (Intent::ObjectionTrust, count_matches(&lower, &TRUST_OBJECTION_KEYWORDS)),
            (Intent::AutomationNeed, count_matches(&lower, &AUTOMATION_KEYWORDS)),
            (Intent::FreeResources, count_matches(&lower, &FREE_RESOURCE_KEYWORDS)),
            (Intent::Exploration, count_matches(&lower, &EXPLORATION_KEYWORDS)),
            (Intent::ProfessionChange, count_matches(&lower, &PROFESSION_KEYWORDS)),
        ];

        let intent = scored
            .iter()
            .filter(|(_, n)| *n > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.priority().cmp(&a.0.priority())))
            .map(|(i, _)| *i)
            .unwrap_or(Intent::GeneralQuestion);

        let positive = count_matches(&lower, &POSITIVE_KEYWORDS);
        let negative = count_matches(&lower, &NEGATIVE_KEYWORDS);
        let sentiment = if positive > negative {
            Sentiment::Positive
        } else if negative > positive {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        let recent_user_messages = window.iter().rev().take(6).filter(|m| m.role == Role::User).count();
        let engagement = engagement_level(text.len(), recent_user_messages);

        let buying_signals = collect_matches(&lower, &BUYING_KEYWORDS);
        let mut objections = BTreeSet::new();
        if intent.is_objection() {
            objections.extend(collect_matches(&lower, &PRICE_OBJECTION_KEYWORDS));
            objections.extend(collect_matches(&lower, &TIME_OBJECTION_KEYWORDS));
            objections.extend(collect_matches(&lower, &VALUE_OBJECTION_KEYWORDS));
            objections.extend(collect_matches(&lower, &TRUST_OBJECTION_KEYWORDS));
        }
        let mut interests = collect_matches(&lower, &EXPLORATION_KEYWORDS);
        interests.extend(collect_matches(&lower, &AUTOMATION_KEYWORDS));
        let challenges = collect_matches(&lower, &TIME_OBJECTION_KEYWORDS)
            .into_iter()
            .chain(collect_matches(&lower, &PROFESSION_KEYWORDS))
            .collect();

        let response_style = Some(
            match (sentiment, engagement) {
                (Sentiment::Negative, _) => "empático y concreto",
                (_, EngagementLevel::VeryHigh) => "directo, orientado a cierre",
                (_, EngagementLevel::High) => "entusiasta y específico",
                _ => "cálido e informativo",
            }
            .to_string(),
        );

        let next_focus = match intent {
            Intent::BuyingSignals => Some("facilitar la inscripción".to_string()),
            i if i.is_objection() => Some("resolver la objeción antes de avanzar".to_string()),
            Intent::Exploration => Some("mostrar el valor del contenido".to_string()),
            _ => None,
        };

        AnalysisSnapshot {
            sentiment,
            engagement,
            intent,
            challenges,
            interests,
            objections,
            buying_signals,
            response_style,
            suggested_tools: Vec::new(),
            next_focus,
        }
    }

    /// Merges the snapshot into the profile (idempotent unions) and applies
    /// the lead-score deltas: +15 very_high, +10 high, -5 low engagement,
    /// +20 on explicit buying signals, always clamped.
    pub fn apply_to_profile(snapshot: &AnalysisSnapshot, profile: &mut UserProfile) {
        profile.traits.interests.extend(snapshot.interests.iter().cloned());
        profile.traits.challenges.extend(snapshot.challenges.iter().cloned());
        profile.traits.objections.extend(snapshot.objections.iter().cloned());
        profile.traits.buying_signals.extend(snapshot.buying_signals.iter().cloned());
        if let Some(style) = &snapshot.response_style {
            profile.traits.communication_style = Some(style.clone());
        }
        profile.engagement = snapshot.engagement;

        match snapshot.engagement {
            EngagementLevel::VeryHigh => profile.bump_lead_score(15),
            EngagementLevel::High => profile.bump_lead_score(10),
            EngagementLevel::Low => profile.bump_lead_score(-5),
            EngagementLevel::Medium => {}
        }
        if snapshot.intent == Intent::BuyingSignals {
            profile.bump_lead_score(20);
        }
    }
}

/// Engagement as a function of message length and recent activity density.
fn engagement_level(text_len: usize, recent_user_messages: usize) -> EngagementLevel {
    let length_points = (text_len / 60).min(3);
    let activity_points = recent_user_messages.min(3);
    match length_points + activity_points {
        0 | 1 => EngagementLevel::Low,
        2 | 3 => EngagementLevel::Medium,
        4 => EngagementLevel::High,
        _ => EngagementLevel::VeryHigh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> AnalysisSnapshot {
        Analyzer::rules_only().analyze_with_rules(text, &[])
    }

    #[test]
    fn price_objection_detected() {
        let snapshot = classify("Me parece muy caro");
        assert_eq!(snapshot.intent, Intent::ObjectionPrice);
        assert_eq!(snapshot.sentiment, Sentiment::Negative);
    }

    #[test]
    fn buying_signals_win_ties() {
        // matches both a buying keyword and a price keyword; buying wins on priority
        let snapshot = classify("quiero pagar aunque sea caro");
        assert_eq!(snapshot.intent, Intent::BuyingSignals);
        assert!(!snapshot.buying_signals.is_empty());
    }

    #[test]
    fn exploration_from_content_questions() {
        let snapshot = classify("¿Qué voy a aprender exactamente? me interesa el temario");
        // "me interesa" is a buying keyword; higher keyword count decides first
        assert!(matches!(snapshot.intent, Intent::Exploration | Intent::BuyingSignals));
        let plain = classify("¿de qué trata el temario y el contenido?");
        assert_eq!(plain.intent, Intent::Exploration);
    }

    #[test]
    fn unmatched_text_is_general_question() {
        let snapshot = classify("hola");
        assert_eq!(snapshot.intent, Intent::GeneralQuestion);
    }

    #[test]
    fn engagement_grows_with_length_and_density() {
        assert_eq!(engagement_level(10, 0), EngagementLevel::Low);
        assert_eq!(engagement_level(100, 1), EngagementLevel::Medium);
        assert_eq!(engagement_level(200, 1), EngagementLevel::High);
        assert_eq!(engagement_level(260, 3), EngagementLevel::VeryHigh);
    }

    #[test]
    fn lead_score_deltas_apply_clamped() {
        let mut profile = UserProfile::new(1, "Ana", None);
        let mut snapshot = classify("quiero inscribirme ya, estoy lista");
        snapshot.engagement = EngagementLevel::VeryHigh;
        Analyzer::apply_to_profile(&snapshot, &mut profile);
        // +15 engagement, +20 buying signals
        assert_eq!(profile.lead_score, 35);
        assert!(profile.traits.buying_signals.contains("inscribirme"));

        let mut low = AnalysisSnapshot::default();
        low.engagement = EngagementLevel::Low;
        let before = profile.lead_score;
        Analyzer::apply_to_profile(&low, &mut profile);
        assert_eq!(profile.lead_score, before - 5);
    }
}
