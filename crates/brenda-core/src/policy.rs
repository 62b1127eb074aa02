//! Tool selection policy: maps (analysis, memory, message) to an ordered
//! list of tool ids, then applies conversational pacing and deduplication.
//!
//! Decision order, first match wins: purchase-intent override, explicit
//! contact intent, explicit resource request, intent-driven table,
//! behavioural fallback. Hard cap of two tools per turn, three on the
//! purchase override. The policy is a pure function over its inputs; it
//! never executes handlers.

use crate::analyzer::{AnalysisSnapshot, Intent};
use crate::profile::{EngagementLevel, UserProfile};
use crate::tool::ToolId;
use once_cell::sync::Lazy;

const MAX_TOOLS_PER_TURN: usize = 2;
const MAX_TOOLS_PURCHASE: usize = 3;
const EXPLORATION_RESOURCE_CAP: u32 = 2;

static PURCHASE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "inscribirme", "inscribirse", "comprar", "pagar", "depósito", "deposito",
        "transferencia", "estoy lista", "estoy listo", "acepto", "dónde deposito",
        "donde deposito", "dónde pago", "donde pago", "quiero empezar ya",
    ]
});

static CONTACT_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["asesor", "asesora", "hablar", "contactar", "ayuda", "consulta", "especialista", "soporte"]
});

static RESOURCE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["recursos", "material", "guía", "guia", "plantilla", "template", "gratis"]
});

static CONTENT_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["temario", "contenido", "syllabus", "módulos", "modulos", "sesiones", "aprender"]
});

static PREVIEW_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["video", "vídeo", "ejemplo", "muestra", "preview", "vista previa", "clase de prueba"]);

static COMPARISON_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["comparar", "comparación", "comparacion", "competencia", "otros cursos", "versus", " vs "]);

static PRICE_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["precio", "costo", "cuánto cuesta", "cuanto cuesta", "caro", "descuento", "oferta"]);

static BUYING_SIGNAL_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "me interesa", "quiero empezar", "cuándo empieza", "cuando empieza", "inscribirme",
        "comprar", "pagar", "estoy lista", "estoy listo",
    ]
});

fn contains_any(text: &str, table: &[&str]) -> bool {
    table.iter().any(|k| text.contains(k))
}

fn count_any(text: &str, table: &[&str]) -> usize {
    table.iter().filter(|k| text.contains(*k)).count()
}

/// Conversation state driving the pacing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    FirstContact,
    Exploring,
    Interested,
    Objecting,
    ReadyToBuy,
}

impl ConversationState {
    pub fn derive(snapshot: &AnalysisSnapshot, profile: &UserProfile) -> Self {
        if profile.total_messages <= 1 {
            return ConversationState::FirstContact;
        }
        if snapshot.intent.is_objection() {
            return ConversationState::Objecting;
        }
        if snapshot.intent == Intent::BuyingSignals || profile.lead_score >= 80 {
            return ConversationState::ReadyToBuy;
        }
        if profile.lead_score >= 50 || snapshot.engagement >= EngagementLevel::High {
            return ConversationState::Interested;
        }
        ConversationState::Exploring
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    pub tools: Vec<ToolId>,
    /// Purchase override: the composer returns only tool outputs; no LLM
    /// narrative is produced this turn.
    pub bypass_llm: bool,
}

/// Selects tools for one turn.
pub fn select_tools(
    snapshot: &AnalysisSnapshot,
    profile: &UserProfile,
    text: &str,
) -> PolicyDecision {
    let lower = text.to_lowercase();
    let state = ConversationState::derive(snapshot, profile);

    // 1. Purchase intent override
    if contains_any(&lower, &PURCHASE_KEYWORDS) {
        let candidates = vec![ToolId::SendPaymentInfo, ToolId::ContactAdvisorDirectly, ToolId::ShowBonuses];
        let tools = apply_pacing(candidates, state, profile, &lower, MAX_TOOLS_PURCHASE);
        let bypass_llm = !tools.is_empty();
        return PolicyDecision { tools, bypass_llm };
    }

    // 2..5: ordered candidate list, first match first
    let mut candidates: Vec<ToolId> = Vec::new();

    if contains_any(&lower, &CONTACT_KEYWORDS) {
        candidates.push(ToolId::ContactAdvisorDirectly);
    } else if contains_any(&lower, &RESOURCE_KEYWORDS) {
        candidates.push(ToolId::SendFreeResources);
    } else if let Some(tool) = intent_tool(snapshot.intent, &lower) {
        candidates.push(tool);
    }

    if candidates.is_empty() {
        candidates.push(behavioural_fallback(profile, &lower));
    }

    let tools = apply_pacing(candidates, state, profile, &lower, MAX_TOOLS_PER_TURN);
    PolicyDecision { tools, bypass_llm: false }
}

/// Intent-driven mapping with keyword refinement inside the intent.
fn intent_tool(intent: Intent, lower: &str) -> Option<ToolId> {
    match intent {
        Intent::Exploration => Some(if contains_any(lower, &CONTENT_KEYWORDS) {
            ToolId::ShowSyllabus
        } else if contains_any(lower, &PREVIEW_KEYWORDS) {
            ToolId::SendPreview
        } else {
            ToolId::SendFreeResources
        }),
        Intent::FreeResources => Some(ToolId::SendFreeResources),
        Intent::ObjectionPrice => Some(ToolId::ShowPricingComparison),
        Intent::ObjectionValue => Some(ToolId::ShowSimilarSuccessCases),
        Intent::ObjectionTrust => Some(ToolId::ShowGuarantee),
        Intent::ObjectionTime => Some(ToolId::HandleTimeObjection),
        Intent::AutomationNeed => Some(ToolId::DetectAutomationNeeds),
        Intent::BuyingSignals => Some(if contains_any(lower, &PRICE_KEYWORDS) {
            ToolId::PresentLimitedOffer
        } else {
            ToolId::ShowBonuses
        }),
        Intent::GeneralQuestion | Intent::ProfessionChange => None,
    }
}

/// Behavioural fallback when nothing above matched.
fn behavioural_fallback(profile: &UserProfile, lower: &str) -> ToolId {
    if profile.total_messages >= 3 && profile.lead_score > 70 {
        ToolId::ShowBonuses
    } else if profile.total_messages >= 2 && profile.lead_score < 60 {
        ToolId::ShowTestimonials
    } else if contains_any(lower, &COMPARISON_KEYWORDS) {
        ToolId::ShowCompetitorComparison
    } else if count_any(lower, &BUYING_SIGNAL_KEYWORDS) >= 2 {
        ToolId::PresentLimitedOffer
    } else {
        ToolId::ShowSyllabus
    }
}

/// Tools whose output delivers attachments (exploration resource cap).
fn sends_resources(id: ToolId) -> bool {
    matches!(id, ToolId::SendFreeResources | ToolId::SendPreview | ToolId::ShowSyllabus)
}

/// True when the latest message explicitly asks for this tool again, which
/// lifts the deduplication suppression.
fn explicitly_requested(id: ToolId, lower: &str) -> bool {
    match id {
        ToolId::ShowSyllabus => contains_any(lower, &CONTENT_KEYWORDS),
        ToolId::SendPreview => contains_any(lower, &PREVIEW_KEYWORDS),
        ToolId::SendFreeResources => contains_any(lower, &RESOURCE_KEYWORDS),
        ToolId::SendPaymentInfo => contains_any(lower, &PURCHASE_KEYWORDS),
        ToolId::ContactAdvisorDirectly => contains_any(lower, &CONTACT_KEYWORDS),
        ToolId::ShowCompetitorComparison => contains_any(lower, &COMPARISON_KEYWORDS),
        ToolId::ShowPricingComparison | ToolId::PresentLimitedOffer => {
            contains_any(lower, &PRICE_KEYWORDS)
        }
        _ => false,
    }
}

/// Pacing and deduplication, applied after selection.
fn apply_pacing(
    candidates: Vec<ToolId>,
    state: ConversationState,
    profile: &UserProfile,
    lower: &str,
    cap: usize,
) -> Vec<ToolId> {
    // First interaction: conversation only, no tools at all.
    if state == ConversationState::FirstContact {
        return Vec::new();
    }

    let effective_cap = match state {
        ConversationState::Exploring => cap.min(1),
        _ => cap,
    };

    let mut out: Vec<ToolId> = Vec::new();
    let mut pool = candidates;

    // Ready-to-buy: closing tools jump the queue.
    if state == ConversationState::ReadyToBuy {
        pool.sort_by_key(|t| if t.is_closing() { 0 } else { 1 });
    }

    for id in pool {
        if out.len() >= effective_cap {
            break;
        }
        if out.contains(&id) {
            continue;
        }
        // Objecting users only receive objection-handling or closing-path
        // contact tools.
        if state == ConversationState::Objecting
            && !id.is_objection_handler()
            && id != ToolId::ContactAdvisorDirectly
        {
            continue;
        }
        // Exploration resource cap: at most two attachments over the whole
        // conversation before resource-senders are suppressed.
        if state == ConversationState::Exploring
            && sends_resources(id)
            && profile.resources_sent >= EXPLORATION_RESOURCE_CAP
        {
            continue;
        }
        // Deduplication: re-emit only on explicit re-request or after a
        // recorded failure.
        if profile.has_used_tool(id.as_str())
            && !explicitly_requested(id, lower)
            && !profile.tools_failed.contains(id.as_str())
        {
            continue;
        }
        out.push(id);
    }
    out
}
