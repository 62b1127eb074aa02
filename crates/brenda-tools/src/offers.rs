//! Bonus and limited-offer tools. Urgency comes only from real expiry dates
//! and claim counters in the catalog.

use brenda_core::render;
use brenda_core::{BoxError, SalesTool, ToolContext, ToolId, ToolResult};

const BONUS_SAFE_COPY: &str =
    "Déjame revisar qué bonos siguen vigentes para tu inscripción y te confirmo en un momento.";

/// Lists the active bonuses with value, expiry and remaining claims.
pub struct ShowBonuses;

#[async_trait::async_trait]
impl SalesTool for ShowBonuses {
    fn id(&self) -> ToolId {
        ToolId::ShowBonuses
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: BONUS_SAFE_COPY.to_string() });
        };
        let bonuses = ctx.catalog.list_bonuses(course_id)?;
        if bonuses.is_empty() {
            return Ok(ToolResult::Failed { content: BONUS_SAFE_COPY.to_string() });
        }

        let mut lines = vec!["Al inscribirte hoy, estos bonos van incluidos:".to_string()];
        for bonus in &bonuses {
            let mut line = format!(
                "🎁 {} (valor {})",
                render::render_text(bonus.name.as_deref()),
                render::render_price(bonus.original_value, Some("USD")),
            );
            if let Some(remaining) = bonus.remaining_claims() {
                line.push_str(&format!(" — quedan {}", remaining));
            }
            if let Some(expires) = &bonus.expires_at {
                line.push_str(&format!(", vigente hasta {}", expires));
            }
            lines.push(line);
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "bonuses": bonuses.len() }),
        )?;

        Ok(ToolResult::Text { content: lines.join("\n") })
    }
}

/// Time-bounded offer: only emitted when a bonus actually has an expiry or a
/// finite claim pool left.
pub struct PresentLimitedOffer;

#[async_trait::async_trait]
impl SalesTool for PresentLimitedOffer {
    fn id(&self) -> ToolId {
        ToolId::PresentLimitedOffer
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: BONUS_SAFE_COPY.to_string() });
        };
        let bonuses = ctx.catalog.list_bonuses(course_id)?;
        let limited = bonuses.iter().find(|b| {
            b.expires_at.is_some() || b.remaining_claims().map(|r| r > 0).unwrap_or(false)
        });
        let Some(bonus) = limited else {
            return Ok(ToolResult::Failed { content: BONUS_SAFE_COPY.to_string() });
        };

        let mut content = format!(
            "Ahora mismo tu inscripción incluye {} (valor {})",
            render::render_text(bonus.name.as_deref()),
            render::render_price(bonus.original_value, Some("USD")),
        );
        if let Some(remaining) = bonus.remaining_claims() {
            content.push_str(&format!(": quedan solo {} lugares con este bono", remaining));
        }
        if let Some(expires) = &bonus.expires_at {
            content.push_str(&format!(" y vence el {}", expires));
        }
        content.push_str(". Si decides hoy, te lo aseguro de inmediato.");

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "bonus": bonus.id }),
        )?;

        Ok(ToolResult::Text { content })
    }
}
