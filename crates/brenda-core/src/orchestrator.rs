//! Turn engine: sequential async composition of the whole pipeline.
//!
//! One inbound event flows through: intake (while the preamble is
//! incomplete) → advisor handoff (while that modal flow is active) →
//! analyzer → memory update → tool policy → tool execution (individual
//! timeouts) → LLM completion (own budget, abandoned on expiry) → grounding
//! validator → composer. Each user's turns are serialised through the
//! per-user lock; the whole turn runs under an end-to-end budget and every
//! internal error is caught at this boundary, so one user's failure never
//! propagates and at most one generic failure sentence is emitted per turn.

use crate::analyzer::{AnalysisSnapshot, Analyzer};
use crate::campaign::CampaignMap;
use crate::catalog::CatalogGateway;
use crate::composer::{self, Reply};
use crate::config::BotConfig;
use crate::error::CoreResult;
use crate::event::InboundEvent;
use crate::handoff::HandoffFlow;
use crate::intake;
use crate::llm::LlmBridge;
use crate::memory::MemoryStore;
use crate::policy;
use crate::profile::{MessageRecord, Stage, UserProfile};
use crate::prompt;
use crate::tool::{ToolContext, ToolId, ToolRegistry, ToolResult};
use crate::validator::{self, GroundingFacts};
use std::sync::Arc;
use std::time::Duration;

/// Single generic failure sentence; never a stack trace or technical code.
const APOLOGY: &str =
    "Tuve un problema técnico procesando tu mensaje, ¿lo intentas de nuevo, por favor?";

/// Neutral fallback when neither the LLM nor any tool produced content.
const NEUTRAL_FALLBACK: &str =
    "Gracias por tu mensaje. ¿Quieres saber algo del contenido, ver precios o hablar con un asesor?";

pub struct TurnEngine {
    config: BotConfig,
    memory: Arc<MemoryStore>,
    catalog: Arc<CatalogGateway>,
    llm: Option<Arc<LlmBridge>>,
    analyzer: Analyzer,
    registry: Arc<ToolRegistry>,
    handoff: HandoffFlow,
    campaigns: CampaignMap,
}

impl TurnEngine {
    pub fn new(
        config: BotConfig,
        memory: Arc<MemoryStore>,
        catalog: Arc<CatalogGateway>,
        llm: Option<Arc<LlmBridge>>,
        registry: Arc<ToolRegistry>,
        handoff: HandoffFlow,
    ) -> Self {
        let campaigns = CampaignMap::from_config(config.campaign_map_path.as_deref());
        let analyzer = Analyzer::new(llm.clone());
        Self { config, memory, catalog, llm, analyzer, registry, handoff, campaigns }
    }

    /// Entry point for one inbound event. Serialises per user, applies the
    /// end-to-end budget, and converts every failure into the apology.
    pub async fn handle_event(&self, event: InboundEvent) -> Reply {
        let lock = self.memory.user_lock(event.user_id);
        let _guard = lock.lock().await;

        let budget = Duration::from_secs(self.config.turn_timeout_secs);
        match tokio::time::timeout(budget, self.process(&event)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(user_id = event.user_id, "turn failed: {}", e);
                Reply::text(APOLOGY)
            }
            Err(_) => {
                tracing::warn!(user_id = event.user_id, "turn exceeded {:?} budget", budget);
                Reply::text(APOLOGY)
            }
        }
    }

    async fn process(&self, event: &InboundEvent) -> CoreResult<Reply> {
        if event.text.is_none() && event.callback_payload.is_none() {
            return Ok(Reply::empty());
        }

        let mut profile = match self.memory.load(event.user_id).await? {
            Some(p) => p,
            None => {
                let p = UserProfile::new(event.user_id, &event.first_name, event.username.clone());
                self.memory.save(&p).await?;
                p
            }
        };

        // The raw inbound message is always logged, even if the rest of the
        // turn aborts.
        profile.push_message(MessageRecord::user(event.content()));
        self.memory.save(&profile).await?;

        let reply = if profile.preamble_incomplete() {
            let reply = intake::handle(event, &mut profile, &self.catalog, &self.campaigns);
            self.finish_turn(&mut profile, &reply, Vec::new(), None).await?;
            reply
        } else if profile.stage == Stage::AdvisorHandoff {
            // Modal sub-dialogue: the LLM path is suspended.
            let reply = self.handoff.handle(event, &mut profile, &self.catalog).await;
            self.finish_turn(&mut profile, &reply, Vec::new(), None).await?;
            reply
        } else {
            self.free_dialogue_turn(event, &mut profile).await?
        };

        Ok(reply)
    }

    async fn free_dialogue_turn(
        &self,
        event: &InboundEvent,
        profile: &mut UserProfile,
    ) -> CoreResult<Reply> {
        // Explicit UI buttons map deterministically, outside the policy.
        match event.callback_payload.as_deref() {
            Some(intake::CB_CONTACT_ADVISOR) => {
                let reply = self.handoff.enter(profile);
                self.finish_turn(profile, &reply, Vec::new(), None).await?;
                return Ok(reply);
            }
            Some(intake::CB_COURSE_PRICES) => {
                let results = self.execute_tools(&[ToolId::ShowPricingComparison], profile).await;
                let reply = composer::compose(None, &results);
                self.record_tool_outcomes(profile, &results, &reply);
                self.finish_turn(profile, &reply, tool_names(&results), None).await?;
                return Ok(reply);
            }
            Some(intake::CB_COURSE_ASK) => {
                let reply = Reply::text(
                    "Claro, pregúntame lo que quieras sobre el curso y te respondo enseguida.",
                );
                self.finish_turn(profile, &reply, Vec::new(), None).await?;
                return Ok(reply);
            }
            _ => {}
        }

        let text = event.content().to_string();
        let course = profile
            .course_id
            .as_deref()
            .and_then(|id| self.catalog.get_course(id).ok().flatten());

        // Classification runs over the window *before* this message.
        let window: Vec<MessageRecord> =
            profile.recent_log(prompt::HISTORY_WINDOW + 1).to_vec();
        let snapshot = self
            .analyzer
            .analyze(&text, &window[..window.len().saturating_sub(1)], course.as_ref().and_then(|c| c.name.as_deref()))
            .await;

        let decision = policy::select_tools(&snapshot, profile, &text);
        let results = self.execute_tools(&decision.tools, profile).await;
        let contact_flow = results.iter().any(|(_, r)| r.is_contact_flow());

        // LLM narrative: skipped on purchase override and during handoff
        // entry; abandoned past its budget.
        let llm_text = if decision.bypass_llm || contact_flow {
            None
        } else {
            self.grounded_completion(profile, &snapshot, course.as_ref().map(|c| &c.id), &text).await
        };

        let mut reply = composer::compose(llm_text.as_deref(), &results);

        if contact_flow {
            // The advisor flow owns the rest of the conversation; its first
            // prompt rides along after the tool outputs.
            let flow_reply = self.handoff.enter(profile);
            for part in flow_reply.parts {
                reply.push(part);
            }
        }

        if reply.parts.is_empty() {
            reply = Reply::text(NEUTRAL_FALLBACK);
        }

        self.record_tool_outcomes(profile, &results, &reply);

        // Learned-attribute updates only land once the composer has run, so
        // an aborted turn is a no-op for them.
        Analyzer::apply_to_profile(&snapshot, profile);
        self.finish_turn(profile, &reply, tool_names(&results), Some(snapshot)).await?;
        Ok(reply)
    }

    /// Completion + grounding validation; `None` when the LLM is absent,
    /// errors out, or exceeds its budget (no retry, next turn re-engages).
    async fn grounded_completion(
        &self,
        profile: &UserProfile,
        snapshot: &AnalysisSnapshot,
        course_id: Option<&String>,
        text: &str,
    ) -> Option<String> {
        let llm = self.llm.as_ref()?;

        let facts = self.load_facts(course_id.map(String::as_str));
        let messages = prompt::assemble(
            profile,
            snapshot,
            facts.course.as_ref(),
            &self.registry.registered_ids(),
            text,
        );

        let budget = Duration::from_secs(self.config.llm_timeout_secs);
        let completion = tokio::time::timeout(
            budget,
            llm.chat(messages, Some(0.7), Some(self.config.max_completion_tokens)),
        )
        .await;

        match completion {
            Ok(Ok(raw)) => {
                let (validated, _verdict) = validator::validate(&raw, &facts);
                Some(validated)
            }
            Ok(Err(e)) => {
                tracing::warn!("llm completion failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("llm completion abandoned after {:?}", budget);
                None
            }
        }
    }

    fn load_facts(&self, course_id: Option<&str>) -> GroundingFacts {
        let Some(id) = course_id else { return GroundingFacts::default() };
        GroundingFacts {
            course: self.catalog.get_course(id).ok().flatten(),
            sessions: self.catalog.list_sessions(id).unwrap_or_default(),
            bonuses: self.catalog.list_bonuses(id).unwrap_or_default(),
        }
    }

    /// Runs the selected tools in order, each under its own timeout. An
    /// expired tool is dropped and the turn proceeds with the rest.
    async fn execute_tools(
        &self,
        tools: &[ToolId],
        profile: &UserProfile,
    ) -> Vec<(ToolId, ToolResult)> {
        let mut results = Vec::with_capacity(tools.len());
        let budget = Duration::from_secs(self.config.tool_timeout_secs);
        for &id in tools {
            let ctx = ToolContext {
                user_id: profile.user_id,
                course_id: profile.course_id.as_deref(),
                profile,
                catalog: &self.catalog,
            };
            match tokio::time::timeout(budget, self.registry.run(id, &ctx)).await {
                Ok(result) => results.push((id, result)),
                Err(_) => {
                    tracing::warn!(tool = %id, "tool dropped after {:?} budget", budget);
                }
            }
        }
        results
    }

    /// Bookkeeping after execution: tools_used / tools_failed multisets and
    /// the conversation-wide resource counter.
    fn record_tool_outcomes(
        &self,
        profile: &mut UserProfile,
        results: &[(ToolId, ToolResult)],
        reply: &Reply,
    ) {
        for (id, result) in results {
            if result.is_failed() {
                profile.record_tool_failure(id.as_str());
            } else {
                profile.record_tool_use(id.as_str());
            }
        }
        profile.resources_sent += reply.attachment_count() as u32;
    }

    /// Logs the assistant reply and persists the profile.
    async fn finish_turn(
        &self,
        profile: &mut UserProfile,
        reply: &Reply,
        tools: Vec<String>,
        analysis: Option<AnalysisSnapshot>,
    ) -> CoreResult<()> {
        let outbound: Vec<&str> = reply.text_parts().collect();
        if !outbound.is_empty() {
            let mut record = MessageRecord::assistant(outbound.join("\n")).with_tools(tools);
            if let Some(snapshot) = analysis {
                record = record.with_analysis(snapshot);
            }
            profile.push_message(record);
        }
        self.memory.save(profile).await
    }
}

fn tool_names(results: &[(ToolId, ToolResult)]) -> Vec<String> {
    results.iter().map(|(id, _)| id.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn engine_without_tools() -> (TurnEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryStore::open(dir.path().join("mem")).unwrap());
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE courses (id TEXT PRIMARY KEY, name TEXT, short_description TEXT, \
                 long_description TEXT, level TEXT, price TEXT, currency TEXT, \
                 total_duration_min TEXT, session_count INTEGER, status TEXT, subtheme_id TEXT, \
                 syllabus_url TEXT, course_url TEXT, purchase_url TEXT, audience_category TEXT);",
        )
        .unwrap();
        let catalog = Arc::new(CatalogGateway::from_connection(conn).unwrap());
        let engine = TurnEngine::new(
            BotConfig::default(),
            memory,
            catalog,
            None,
            Arc::new(ToolRegistry::new()),
            HandoffFlow::new(None, None),
        );
        (engine, dir)
    }

    #[tokio::test]
    async fn first_event_creates_profile_and_prompts_privacy() {
        let (engine, _dir) = engine_without_tools();
        let reply = engine
            .handle_event(InboundEvent::text_message(1, "Ana", "hola", 1))
            .await;
        assert!(reply.text_parts().any(|t| t.contains("privacidad")));

        let profile = engine.memory.load(1).await.unwrap().unwrap();
        assert_eq!(profile.stage, Stage::PrivacyPending);
        // raw message + assistant prompt are both logged
        assert!(profile.log.len() >= 2);
    }

    #[tokio::test]
    async fn empty_event_is_a_no_op() {
        let (engine, _dir) = engine_without_tools();
        let mut event = InboundEvent::text_message(2, "Ana", "x", 1);
        event.text = None;
        let reply = engine.handle_event(event).await;
        assert!(reply.parts.is_empty());
        assert!(engine.memory.load(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn free_dialogue_without_llm_or_tools_falls_back_neutrally() {
        let (engine, _dir) = engine_without_tools();
        let mut profile = UserProfile::new(3, "Ana", None);
        profile.accept_privacy();
        profile.stage = Stage::FreeDialogue;
        profile.total_messages = 3;
        engine.memory.save(&profile).await.unwrap();

        let reply = engine
            .handle_event(InboundEvent::text_message(3, "Ana", "hola otra vez", 5))
            .await;
        // empty registry: selected tool produced the generic safe copy, so
        // the reply is never empty
        assert!(!reply.parts.is_empty());
    }
}
