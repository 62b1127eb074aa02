//! Advisor handoff flow: a modal sub-dialogue that collects the contact
//! fields missing from the profile and dispatches an email to the human
//! advisor.
//!
//! While the flow is active the free-dialogue LLM path is suspended for the
//! user. Malformed input re-prompts; a transport failure at dispatch reports
//! to the user and rolls the sub-state back to `confirming` so the user can
//! retry. Explicit cancel exits from any sub-state.

use crate::catalog::CatalogGateway;
use crate::composer::{Button, Reply};
use crate::config::BotConfig;
use crate::error::CoreError;
use crate::event::InboundEvent;
use crate::profile::{HandoffStage, Stage, UserProfile};
use crate::render;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

pub const CB_ADVISOR_CONFIRM: &str = "advisor_confirm";
pub const CB_ADVISOR_CANCEL: &str = "advisor_cancel";

const EMAIL_RETRY_ATTEMPTS: u32 = 3;
const EMAIL_RETRY_BASE_MS: u64 = 200;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,17}$").expect("phone regex"));

pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s.trim())
}

pub fn is_valid_phone(s: &str) -> bool {
    PHONE_RE.is_match(s.trim())
}

// ---------------------------------------------------------------------------
// Email gateway seam
// ---------------------------------------------------------------------------

/// Outbound email transport. The SMTP implementation is the production
/// gateway; tests substitute a recording stub.
#[async_trait::async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CoreError>;
}

/// SMTP transport with TLS via lettre.
pub struct SmtpEmailGateway {
    transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
    from: String,
}

impl SmtpEmailGateway {
    /// Builds the gateway from config; `None` when SMTP is not configured.
    pub fn from_config(config: &BotConfig) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let user = config.smtp_user.clone().unwrap_or_default();
        let pass = config.smtp_pass.clone().unwrap_or_default();
        let transport = lettre::AsyncSmtpTransport::<lettre::Tokio1Executor>::relay(host)
            .ok()?
            .credentials(lettre::transport::smtp::authentication::Credentials::new(
                user.clone(),
                pass,
            ))
            .build();
        Some(Self { transport, from: user })
    }
}

#[async_trait::async_trait]
impl EmailGateway for SmtpEmailGateway {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CoreError> {
        use lettre::AsyncTransport;
        let message = lettre::Message::builder()
            .from(self.from.parse().map_err(|e| CoreError::Email(format!("bad from address: {}", e)))?)
            .to(to.parse().map_err(|e| CoreError::Email(format!("bad to address: {}", e)))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| CoreError::Email(format!("message build failed: {}", e)))?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::Email(format!("smtp send failed: {}", e)))
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

pub struct HandoffFlow {
    email: Option<Arc<dyn EmailGateway>>,
    advisor_email: Option<String>,
}

impl HandoffFlow {
    pub fn new(email: Option<Arc<dyn EmailGateway>>, advisor_email: Option<String>) -> Self {
        Self { email, advisor_email }
    }

    /// Enters the flow: normalises what is missing from the profile and
    /// prompts for the first absent field.
    pub fn enter(&self, profile: &mut UserProfile) -> Reply {
        let _ = profile.advance_stage(Stage::AdvisorHandoff);
        let (stage, reply) = self.next_missing(profile);
        profile.handoff = Some(stage);
        reply
    }

    fn next_missing(&self, profile: &UserProfile) -> (HandoffStage, Reply) {
        if profile.course_id.is_none() {
            return (
                HandoffStage::AwaitingCourse,
                Reply::text("Con gusto te conecto con un asesor. ¿Sobre qué curso quieres hablar?"),
            );
        }
        if profile.email.is_none() {
            return (
                HandoffStage::AwaitingEmail,
                Reply::text("Perfecto. ¿A qué correo electrónico puede escribirte el asesor?"),
            );
        }
        if profile.phone.is_none() {
            return (
                HandoffStage::AwaitingPhone,
                Reply::text("¿Y a qué número de teléfono te puede llamar? (con lada, por favor)"),
            );
        }
        (HandoffStage::Confirming, self.confirmation_prompt(profile))
    }

    fn confirmation_prompt(&self, profile: &UserProfile) -> Reply {
        Reply::text(format!(
            "Confirmo tus datos:\n• Nombre: {}\n• Correo: {}\n• Teléfono: {}\n¿Los envío al asesor?",
            profile.display_name(),
            render::render_text(profile.email.as_deref()),
            render::render_text(profile.phone.as_deref()),
        ))
        .with_keyboard(vec![
            Button::new("Enviar", CB_ADVISOR_CONFIRM),
            Button::new("Cancelar", CB_ADVISOR_CANCEL),
        ])
    }

    fn exit(&self, profile: &mut UserProfile) {
        profile.handoff = None;
        let _ = profile.advance_stage(Stage::FreeDialogue);
    }

    fn is_cancel(event: &InboundEvent) -> bool {
        if event.callback_payload.as_deref() == Some(CB_ADVISOR_CANCEL) {
            return true;
        }
        event
            .text
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case("cancelar"))
            .unwrap_or(false)
    }

    fn is_confirm(event: &InboundEvent) -> bool {
        if event.callback_payload.as_deref() == Some(CB_ADVISOR_CONFIRM) {
            return true;
        }
        event
            .text
            .as_deref()
            .map(|t| {
                let t = t.trim().to_lowercase();
                t == "confirmar" || t == "sí" || t == "si" || t == "enviar"
            })
            .unwrap_or(false)
    }

    /// Drives one turn inside the flow.
    pub async fn handle(
        &self,
        event: &InboundEvent,
        profile: &mut UserProfile,
        catalog: &CatalogGateway,
    ) -> Reply {
        if Self::is_cancel(event) {
            self.exit(profile);
            return Reply::text("Sin problema, seguimos por aquí. ¿En qué más te ayudo?");
        }

        let stage = profile.handoff.unwrap_or(HandoffStage::AwaitingEmail);
        match stage {
            HandoffStage::AwaitingCourse => {
                if let Some(payload) = event.callback_payload.as_deref() {
                    if let Some(id) = payload.strip_prefix(crate::intake::CB_COURSE_PREFIX) {
                        profile.course_id = Some(id.to_string());
                    }
                }
                if profile.course_id.is_none() {
                    let text = event.text.as_deref().unwrap_or("").trim();
                    if !text.is_empty() {
                        if let Ok(matches) = catalog.search_courses(text) {
                            profile.course_id = matches.first().map(|c| c.id.clone());
                        }
                    }
                }
                if profile.course_id.is_none() {
                    return Reply::text(
                        "No encontré ese curso; ¿me repites el nombre tal como aparece en el catálogo?",
                    );
                }
                let (next, reply) = self.next_missing(profile);
                profile.handoff = Some(next);
                reply
            }
            HandoffStage::AwaitingEmail => {
                let text = event.text.as_deref().unwrap_or("").trim();
                if !is_valid_email(text) {
                    return Reply::text(
                        "Ese correo no parece válido; ¿me lo escribes de nuevo? (ej. nombre@dominio.com)",
                    );
                }
                profile.email = Some(text.to_string());
                let (next, reply) = self.next_missing(profile);
                profile.handoff = Some(next);
                reply
            }
            HandoffStage::AwaitingPhone => {
                let text = event.text.as_deref().unwrap_or("").trim();
                if !is_valid_phone(text) {
                    return Reply::text(
                        "Ese teléfono no parece válido; ¿me lo compartes con 10 dígitos?",
                    );
                }
                profile.phone = Some(text.to_string());
                profile.handoff = Some(HandoffStage::Confirming);
                self.confirmation_prompt(profile)
            }
            HandoffStage::Confirming => {
                if !Self::is_confirm(event) {
                    return self.confirmation_prompt(profile);
                }
                match self.dispatch(profile, catalog).await {
                    Ok(()) => {
                        profile.handoff = Some(HandoffStage::Done);
                        self.exit(profile);
                        Reply::text(
                            "¡Listo! Un asesor recibió tus datos y te contactará muy pronto. \
                             Mientras tanto, aquí sigo para lo que necesites.",
                        )
                    }
                    Err(e) => {
                        // Rollback to confirming so the user can retry.
                        tracing::warn!("advisor email dispatch failed: {}", e);
                        profile.handoff = Some(HandoffStage::Confirming);
                        Reply::text(
                            "No pude enviar tus datos al asesor en este momento. \
                             ¿Intento de nuevo?",
                        )
                        .with_keyboard(vec![
                            Button::new("Reintentar", CB_ADVISOR_CONFIRM),
                            Button::new("Cancelar", CB_ADVISOR_CANCEL),
                        ])
                    }
                }
            }
            HandoffStage::Done => {
                self.exit(profile);
                Reply::text("Tus datos ya están con el asesor; te contactará pronto.")
            }
        }
    }

    /// Composes and dispatches the advisor email with bounded retries.
    async fn dispatch(&self, profile: &UserProfile, catalog: &CatalogGateway) -> Result<(), CoreError> {
        let gateway = self
            .email
            .as_ref()
            .ok_or_else(|| CoreError::Email("email gateway not configured".to_string()))?;
        let advisor = self
            .advisor_email
            .as_deref()
            .ok_or_else(|| CoreError::Email("advisor address not configured".to_string()))?;

        let course_name = profile
            .course_id
            .as_deref()
            .and_then(|id| catalog.get_course(id).ok().flatten())
            .and_then(|c| c.name)
            .unwrap_or_else(|| render::PLACEHOLDER.to_string());

        let subject = format!("Nuevo lead: {}", profile.display_name());
        let body = format!(
            "Nombre: {}\nCorreo: {}\nTeléfono: {}\nCurso de interés: {}\n",
            profile.display_name(),
            render::render_text(profile.email.as_deref()),
            render::render_text(profile.phone.as_deref()),
            course_name,
        );

        let mut delay = Duration::from_millis(EMAIL_RETRY_BASE_MS);
        let mut last_err = None;
        for attempt in 0..EMAIL_RETRY_ATTEMPTS {
            match gateway.send(advisor, &subject, &body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < EMAIL_RETRY_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Email("unknown send failure".to_string())))
    }
}
