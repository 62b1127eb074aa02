//! Closing tools: payment data, advisor contact, demo scheduling and
//! follow-up.

use brenda_core::render;
use brenda_core::{
    BoxError, ResourceKind, SalesTool, ToolContext, ToolId, ToolResource, ToolResult,
};

const PAYMENT_SAFE_COPY: &str =
    "Un asesor te confirmará los datos de pago vigentes en un momento; no hagas ningún depósito \
     hasta tenerlos por este medio oficial.";

const DEMO_SAFE_COPY: &str =
    "Con gusto agendamos una demostración; dime qué días te acomodan y lo organizo.";

/// Bank transfer data straight from the payment-info projection.
pub struct SendPaymentInfo;

#[async_trait::async_trait]
impl SalesTool for SendPaymentInfo {
    fn id(&self) -> ToolId {
        ToolId::SendPaymentInfo
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(info) = ctx.catalog.get_payment_info()? else {
            return Ok(ToolResult::Failed { content: PAYMENT_SAFE_COPY.to_string() });
        };

        let mut lines = vec!["¡Excelente decisión! Estos son los datos para tu transferencia:".to_string()];
        lines.push(format!("• Empresa: {}", render::render_text(info.company_name.as_deref())));
        lines.push(format!("• Banco: {}", render::render_text(info.bank_name.as_deref())));
        lines.push(format!("• CLABE: {}", render::render_text(info.clabe_account.as_deref())));
        lines.push(format!("• RFC: {}", render::render_text(info.rfc.as_deref())));
        if info.cfdi_usage.is_some() || info.cfdi_description.is_some() {
            lines.push(format!(
                "• Uso de CFDI: {} ({})",
                render::render_text(info.cfdi_usage.as_deref()),
                render::render_text(info.cfdi_description.as_deref()),
            ));
        }
        lines.push("En cuanto tengas tu comprobante, mándamelo por aquí y confirmamos tu lugar.".to_string());

        let mut resources = Vec::new();
        if let Some(course_id) = ctx.course_id {
            if let Some(course) = ctx.catalog.get_course(course_id)? {
                if let Some(url) = course.purchase_url.filter(|u| !u.trim().is_empty()) {
                    resources.push(ToolResource {
                        kind: ResourceKind::Link,
                        url,
                        caption: Some("Pago en línea".to_string()),
                    });
                }
            }
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            ctx.course_id,
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        if resources.is_empty() {
            Ok(ToolResult::Text { content: lines.join("\n") })
        } else {
            Ok(ToolResult::Multimedia { content: lines.join("\n"), resources })
        }
    }
}

/// Enters the advisor handoff flow; the dialogue core suspends the LLM path
/// until that flow exits.
pub struct ContactAdvisorDirectly;

#[async_trait::async_trait]
impl SalesTool for ContactAdvisorDirectly {
    fn id(&self) -> ToolId {
        ToolId::ContactAdvisorDirectly
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        ctx.catalog.log_interaction(
            ctx.user_id,
            ctx.course_id,
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::ContactFlow {
            content: "Con gusto te conecto con un asesor humano para que te acompañe personalmente."
                .to_string(),
        })
    }
}

/// Offers a personalised demo around the course preview.
pub struct SchedulePersonalizedDemo;

#[async_trait::async_trait]
impl SalesTool for SchedulePersonalizedDemo {
    fn id(&self) -> ToolId {
        ToolId::SchedulePersonalizedDemo
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: DEMO_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: DEMO_SAFE_COPY.to_string() });
        };

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        let content = format!(
            "Puedo agendarte una demostración personalizada de {} con un especialista: \
             30 minutos, sin costo, sobre tu propio caso de uso. ¿Qué día te acomoda?",
            render::render_text(course.name.as_deref()),
        );

        match course.course_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => Ok(ToolResult::Multimedia {
                content,
                resources: vec![ToolResource {
                    kind: ResourceKind::Link,
                    url,
                    caption: Some("Conoce el curso".to_string()),
                }],
            }),
            None => Ok(ToolResult::Text { content }),
        }
    }
}

/// Agrees on a follow-up moment; the interaction row lets a later campaign
/// pick the lead back up.
pub struct ScheduleFollowup;

#[async_trait::async_trait]
impl SalesTool for ScheduleFollowup {
    fn id(&self) -> ToolId {
        ToolId::ScheduleFollowup
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        ctx.catalog.log_interaction(
            ctx.user_id,
            ctx.course_id,
            self.id().as_str(),
            &serde_json::json!({ "requested_by": "policy" }),
        )?;

        Ok(ToolResult::Text {
            content: "Sin presión: ¿te parece si te escribo en unos días para ver cómo vas y \
                      resolver lo que haya quedado pendiente? Dime qué día te va bien."
                .to_string(),
        })
    }
}
