//! Persuasion tool contract: tagged ids, sum-type results, and the registry.
//!
//! The selection policy operates on [`ToolId`]s only; handlers live behind
//! the [`SalesTool`] trait and are looked up in the [`ToolRegistry`] table.
//! Tools read the catalog, never the messenger; their outputs flow to the
//! composer.

use crate::catalog::CatalogGateway;
use crate::error::BoxError;
use crate::profile::UserProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Every persuasion tool the registry can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    ShowSyllabus,
    SendPreview,
    SendFreeResources,
    ShowPricingComparison,
    ShowBonuses,
    ShowTestimonials,
    ShowGuarantee,
    ShowCompetitorComparison,
    HandleTimeObjection,
    PresentLimitedOffer,
    PersonalizeByBudget,
    ShowSimilarSuccessCases,
    ShowSocialProof,
    DetectAutomationNeeds,
    CalculatePersonalRoi,
    SchedulePersonalizedDemo,
    SendPaymentInfo,
    ConnectToCommunity,
    GamificationOverview,
    ResultsTimeline,
    RecommendTools,
    ContactAdvisorDirectly,
    ScheduleFollowup,
}

impl ToolId {
    /// Stable wire name, also used for `tools_used` bookkeeping and the
    /// interaction log.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::ShowSyllabus => "show_syllabus",
            ToolId::SendPreview => "send_preview",
            ToolId::SendFreeResources => "send_free_resources",
            ToolId::ShowPricingComparison => "show_pricing_comparison",
            ToolId::ShowBonuses => "show_bonuses",
            ToolId::ShowTestimonials => "show_testimonials",
            ToolId::ShowGuarantee => "show_guarantee",
            ToolId::ShowCompetitorComparison => "show_competitor_comparison",
            ToolId::HandleTimeObjection => "handle_time_objection",
            ToolId::PresentLimitedOffer => "present_limited_offer",
            ToolId::PersonalizeByBudget => "personalize_by_budget",
            ToolId::ShowSimilarSuccessCases => "show_similar_success_cases",
            ToolId::ShowSocialProof => "show_social_proof",
            ToolId::DetectAutomationNeeds => "detect_automation_needs",
            ToolId::CalculatePersonalRoi => "calculate_personal_roi",
            ToolId::SchedulePersonalizedDemo => "schedule_personalized_demo",
            ToolId::SendPaymentInfo => "send_payment_info",
            ToolId::ConnectToCommunity => "connect_to_community",
            ToolId::GamificationOverview => "gamification_overview",
            ToolId::ResultsTimeline => "results_timeline",
            ToolId::RecommendTools => "recommend_tools",
            ToolId::ContactAdvisorDirectly => "contact_advisor_directly",
            ToolId::ScheduleFollowup => "schedule_followup",
        }
    }

    /// Tools allowed while the user is objecting.
    pub fn is_objection_handler(self) -> bool {
        matches!(
            self,
            ToolId::ShowPricingComparison
                | ToolId::ShowSimilarSuccessCases
                | ToolId::ShowGuarantee
                | ToolId::HandleTimeObjection
                | ToolId::ShowCompetitorComparison
                | ToolId::PersonalizeByBudget
                | ToolId::ShowTestimonials
        )
    }

    /// Closing tools prioritised for ready-to-buy users.
    pub fn is_closing(self) -> bool {
        matches!(
            self,
            ToolId::SendPaymentInfo | ToolId::ContactAdvisorDirectly | ToolId::SchedulePersonalizedDemo
        )
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attachment kind a tool may hand to the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Video,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResource {
    pub kind: ResourceKind,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Tool output union. `ContactFlow` suspends the LLM path and routes the
/// user into the advisor handoff; `Failed` carries the safe copy shown when
/// the catalog had nothing usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResult {
    Text { content: String },
    Multimedia { content: String, resources: Vec<ToolResource> },
    ContactFlow { content: String },
    Failed { content: String },
}

impl ToolResult {
    pub fn content(&self) -> &str {
        match self {
            ToolResult::Text { content }
            | ToolResult::Multimedia { content, .. }
            | ToolResult::ContactFlow { content }
            | ToolResult::Failed { content } => content,
        }
    }

    pub fn resources(&self) -> &[ToolResource] {
        match self {
            ToolResult::Multimedia { resources, .. } => resources,
            _ => &[],
        }
    }

    pub fn is_contact_flow(&self) -> bool {
        matches!(self, ToolResult::ContactFlow { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ToolResult::Failed { .. })
    }
}

/// Everything a tool may read during one execution.
pub struct ToolContext<'a> {
    pub user_id: i64,
    pub course_id: Option<&'a str>,
    pub profile: &'a UserProfile,
    pub catalog: &'a CatalogGateway,
}

/// One persuasion routine. Implementations query the catalog first, degrade
/// to fixed safe copy on empty results, and log an interaction row on
/// success. They never touch the messenger.
#[async_trait::async_trait]
pub trait SalesTool: Send + Sync {
    fn id(&self) -> ToolId;

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError>;
}

/// Generic safe copy used when a tool's handler itself errors out.
pub const TOOL_SAFE_COPY: &str =
    "Déjame confirmar ese dato con el equipo y te lo comparto enseguida.";

/// Table mapping tool ids to handlers.
pub struct ToolRegistry {
    tools: HashMap<ToolId, Arc<dyn SalesTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn SalesTool>) {
        self.tools.insert(tool.id(), tool);
    }

    pub fn get(&self, id: ToolId) -> Option<Arc<dyn SalesTool>> {
        self.tools.get(&id).cloned()
    }

    pub fn registered_ids(&self) -> Vec<ToolId> {
        self.tools.keys().copied().collect()
    }

    /// Executes a tool, absorbing any escaped error into the generic safe
    /// copy so a single tool failure never breaks the turn.
    pub async fn run(&self, id: ToolId, ctx: &ToolContext<'_>) -> ToolResult {
        let Some(tool) = self.get(id) else {
            tracing::warn!(tool = %id, "tool not registered");
            return ToolResult::Failed { content: TOOL_SAFE_COPY.to_string() };
        };
        match tool.execute(ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %id, "tool execution failed: {}", e);
                ToolResult::Failed { content: TOOL_SAFE_COPY.to_string() }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
