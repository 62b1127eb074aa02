//! Durable per-user profile and conversation log.
//!
//! The profile is the single mutable record the whole turn pipeline reads
//! and writes: intake flags, consent, learned attributes, lead score,
//! counters, and the bounded conversation log. Invariants enforced here:
//! consent is monotonic, stage transitions follow the intake table, the lead
//! score stays in 0..=100, learned-attribute merges are idempotent unions,
//! and the log never exceeds [`MAX_LOG_ENTRIES`] nor drops its newest entry.

use crate::analyzer::AnalysisSnapshot;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bound on the persisted conversation log.
pub const MAX_LOG_ENTRIES: usize = 20;

/// Dialogue stage. Only the transitions listed in [`Stage::can_advance_to`]
/// are legal; everything else is rejected with `CoreError::InvalidTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Initial,
    PrivacyPending,
    NamePending,
    CoursePresenting,
    FreeDialogue,
    AdvisorHandoff,
    Closed,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Initial, PrivacyPending)
                | (PrivacyPending, NamePending)
                | (PrivacyPending, Closed)
                | (NamePending, CoursePresenting)
                | (CoursePresenting, FreeDialogue)
                | (FreeDialogue, AdvisorHandoff)
                | (AdvisorHandoff, FreeDialogue)
                // "menu" re-entry is allowed from any non-initial state
                | (NamePending, FreeDialogue)
                | (CoursePresenting, FreeDialogue)
                | (Closed, FreeDialogue)
                | (FreeDialogue, FreeDialogue)
        )
    }
}

/// Engagement level learned by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

/// Author of a conversation log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in the bounded conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub analysis: Option<AnalysisSnapshot>,
}

impl MessageRecord {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tools: Vec::new(),
            analysis: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisSnapshot) -> Self {
        self.analysis = Some(analysis);
        self
    }
}

/// Sub-state of the advisor handoff flow (C9), nested under the profile so a
/// restart resumes where the user left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStage {
    AwaitingCourse,
    AwaitingEmail,
    AwaitingPhone,
    Confirming,
    Done,
}

/// Attributes learned about the user across the conversation. All set fields
/// merge by union, so re-applying the same snapshot is a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedTraits {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub challenges: BTreeSet<String>,
    #[serde(default)]
    pub objections: BTreeSet<String>,
    #[serde(default)]
    pub buying_signals: BTreeSet<String>,
    #[serde(default)]
    pub communication_style: Option<String>,
    #[serde(default)]
    pub decision_timeline: Option<String>,
}

impl LearnedTraits {
    /// Idempotent union merge; `Some` scalars overwrite, `None` never erases.
    pub fn merge(&mut self, delta: &LearnedTraits) {
        if delta.role.is_some() {
            self.role = delta.role.clone();
        }
        if delta.industry.is_some() {
            self.industry = delta.industry.clone();
        }
        self.interests.extend(delta.interests.iter().cloned());
        self.challenges.extend(delta.challenges.iter().cloned());
        self.objections.extend(delta.objections.iter().cloned());
        self.buying_signals.extend(delta.buying_signals.iter().cloned());
        if delta.communication_style.is_some() {
            self.communication_style = delta.communication_style.clone();
        }
        if delta.decision_timeline.is_some() {
            self.decision_timeline = delta.decision_timeline.clone();
        }
    }
}

/// Durable per-user record, keyed by messenger user id. Serialized as JSON
/// into the memory store; created on first inbound event, never destroyed by
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub privacy_accepted: bool,
    #[serde(default)]
    pub privacy_accepted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub assistant_introduced: bool,
    #[serde(default)]
    pub name_collected: bool,
    #[serde(default)]
    pub course_presented: bool,

    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub campaign_source: Option<String>,

    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub handoff: Option<HandoffStage>,

    #[serde(default)]
    pub traits: LearnedTraits,
    #[serde(default)]
    pub engagement: EngagementLevel,
    #[serde(default)]
    pub lead_score: u8,

    #[serde(default)]
    pub total_messages: u32,
    /// Tool name -> times emitted for this user.
    #[serde(default)]
    pub tools_used: BTreeMap<String, u32>,
    /// Tool name -> last execution ended in the safe-copy fallback. A failed
    /// tool may be re-emitted by the policy.
    #[serde(default)]
    pub tools_failed: BTreeSet<String>,
    /// Attachments already delivered across the conversation (pacing cap).
    #[serde(default)]
    pub resources_sent: u32,

    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,

    #[serde(default)]
    pub log: Vec<MessageRecord>,
}

impl UserProfile {
    pub fn new(user_id: i64, first_name: impl Into<String>, username: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            first_name: first_name.into(),
            preferred_name: None,
            username,
            email: None,
            phone: None,
            privacy_accepted: false,
            privacy_accepted_at: None,
            assistant_introduced: false,
            name_collected: false,
            course_presented: false,
            course_id: None,
            campaign_source: None,
            stage: Stage::Initial,
            handoff: None,
            traits: LearnedTraits::default(),
            engagement: EngagementLevel::default(),
            lead_score: 0,
            total_messages: 0,
            tools_used: BTreeMap::new(),
            tools_failed: BTreeSet::new(),
            resources_sent: 0,
            first_seen: now,
            last_seen: now,
            log: Vec::new(),
        }
    }

    /// Name used when addressing the user.
    pub fn display_name(&self) -> &str {
        self.preferred_name.as_deref().unwrap_or(&self.first_name)
    }

    /// Consent is monotonic: once accepted it can never be unset.
    pub fn accept_privacy(&mut self) {
        if !self.privacy_accepted {
            self.privacy_accepted = true;
            self.privacy_accepted_at = Some(Utc::now());
        }
    }

    /// Advances the stage through the intake transition table. Illegal
    /// requests are returned as errors for the caller to log and ignore.
    pub fn advance_stage(&mut self, next: Stage) -> Result<(), CoreError> {
        if self.stage == next {
            return Ok(());
        }
        if !self.stage.can_advance_to(next) {
            return Err(CoreError::InvalidTransition { from: self.stage, to: next });
        }
        self.stage = next;
        Ok(())
    }

    /// Appends to the conversation log, truncating to the last
    /// [`MAX_LOG_ENTRIES`]. Truncation keeps the newest entries.
    pub fn push_message(&mut self, record: MessageRecord) {
        if record.role == Role::User {
            self.total_messages += 1;
        }
        self.last_seen = record.timestamp;
        self.log.push(record);
        if self.log.len() > MAX_LOG_ENTRIES {
            let excess = self.log.len() - MAX_LOG_ENTRIES;
            self.log.drain(..excess);
        }
    }

    /// Last `n` log entries, oldest first.
    pub fn recent_log(&self, n: usize) -> &[MessageRecord] {
        let start = self.log.len().saturating_sub(n);
        &self.log[start..]
    }

    /// Applies a signed lead-score delta, clamped to 0..=100.
    pub fn bump_lead_score(&mut self, delta: i32) {
        let next = (self.lead_score as i32 + delta).clamp(0, 100);
        self.lead_score = next as u8;
    }

    /// Records a successful tool emission.
    pub fn record_tool_use(&mut self, tool: &str) {
        *self.tools_used.entry(tool.to_string()).or_insert(0) += 1;
        self.tools_failed.remove(tool);
    }

    /// Records a tool run that ended in the safe-copy fallback.
    pub fn record_tool_failure(&mut self, tool: &str) {
        self.tools_failed.insert(tool.to_string());
    }

    pub fn has_used_tool(&self, tool: &str) -> bool {
        self.tools_used.contains_key(tool)
    }

    /// True until the intake preamble (privacy + name + presentation) is done.
    pub fn preamble_incomplete(&self) -> bool {
        !matches!(self.stage, Stage::FreeDialogue | Stage::AdvisorHandoff)
    }
}
