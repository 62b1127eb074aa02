//! brenda-tools: the persuasion tool implementations.
//!
//! Every tool follows the same contract: query the catalog first, assemble
//! the message only from returned data, degrade to a fixed fact-free safe
//! copy when the query comes back empty, and log an interaction row on
//! success. Outputs go to the composer; tools never touch the messenger.

mod automation;
mod closing;
mod engagement;
mod objections;
mod offers;
mod pricing;
mod resources;
mod social_proof;
mod syllabus;

#[cfg(test)]
pub(crate) mod testutil;

pub use automation::DetectAutomationNeeds;
pub use closing::{
    ContactAdvisorDirectly, ScheduleFollowup, SchedulePersonalizedDemo, SendPaymentInfo,
};
pub use engagement::{ConnectToCommunity, GamificationOverview, ResultsTimeline};
pub use objections::{HandleTimeObjection, ShowCompetitorComparison, ShowGuarantee};
pub use offers::{PresentLimitedOffer, ShowBonuses};
pub use pricing::{CalculatePersonalRoi, PersonalizeByBudget, ShowPricingComparison};
pub use resources::{RecommendTools, SendFreeResources};
pub use social_proof::{ShowSimilarSuccessCases, ShowSocialProof, ShowTestimonials};
pub use syllabus::{SendPreview, ShowSyllabus};

use brenda_core::ToolRegistry;
use std::sync::Arc;

/// Registry with the full tool set, ready for the turn engine.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ShowSyllabus));
    registry.register(Arc::new(SendPreview));
    registry.register(Arc::new(SendFreeResources));
    registry.register(Arc::new(RecommendTools));
    registry.register(Arc::new(ShowPricingComparison));
    registry.register(Arc::new(PersonalizeByBudget));
    registry.register(Arc::new(CalculatePersonalRoi));
    registry.register(Arc::new(ShowTestimonials));
    registry.register(Arc::new(ShowSimilarSuccessCases));
    registry.register(Arc::new(ShowSocialProof));
    registry.register(Arc::new(ShowGuarantee));
    registry.register(Arc::new(ShowCompetitorComparison));
    registry.register(Arc::new(HandleTimeObjection));
    registry.register(Arc::new(ShowBonuses));
    registry.register(Arc::new(PresentLimitedOffer));
    registry.register(Arc::new(DetectAutomationNeeds));
    registry.register(Arc::new(ConnectToCommunity));
    registry.register(Arc::new(GamificationOverview));
    registry.register(Arc::new(ResultsTimeline));
    registry.register(Arc::new(SendPaymentInfo));
    registry.register(Arc::new(ContactAdvisorDirectly));
    registry.register(Arc::new(SchedulePersonalizedDemo));
    registry.register(Arc::new(ScheduleFollowup));
    registry
}
