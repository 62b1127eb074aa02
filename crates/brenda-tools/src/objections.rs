//! Objection-handling tools: trust, competitor comparison, and lack of time.

use brenda_core::render;
use brenda_core::{BoxError, SalesTool, ToolContext, ToolId, ToolResult};

const GUARANTEE_SAFE_COPY: &str =
    "Es una duda muy válida. Un asesor puede compartirte por escrito las condiciones formales \
     del programa antes de que decidas nada.";

const COMPETITOR_SAFE_COPY: &str =
    "Buena pregunta. Si me dices qué otra opción estás considerando, te preparo una comparación honesta.";

const TIME_SAFE_COPY: &str =
    "Te entiendo; el programa está pensado para agendas ocupadas y puedes avanzar a tu ritmo.";

/// Trust objection: reassurance anchored on verifiable course facts, plus an
/// offer to formalise terms through an advisor.
pub struct ShowGuarantee;

#[async_trait::async_trait]
impl SalesTool for ShowGuarantee {
    fn id(&self) -> ToolId {
        ToolId::ShowGuarantee
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: GUARANTEE_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: GUARANTEE_SAFE_COPY.to_string() });
        };

        let content = format!(
            "Totalmente comprensible querer seguridad antes de invertir. {} tiene temario \
             público con {} sesiones detalladas, y antes de pagar puedes revisar todo el \
             contenido y resolver dudas con un asesor humano. Nada se decide a ciegas.",
            render::render_text(course.name.as_deref()),
            render::render_count(course.session_count),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Text { content })
    }
}

/// Competitor comparison built from the course's own numbers; alternatives
/// are described qualitatively, never with invented figures.
pub struct ShowCompetitorComparison;

#[async_trait::async_trait]
impl SalesTool for ShowCompetitorComparison {
    fn id(&self) -> ToolId {
        ToolId::ShowCompetitorComparison
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: COMPETITOR_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: COMPETITOR_SAFE_COPY.to_string() });
        };

        let content = format!(
            "Comparado con otras opciones del mercado, {} te da:\n\
             • {} sesiones en vivo ({} en total) en lugar de solo videos grabados\n\
             • Precio de {} con acceso completo, sin pagos ocultos\n\
             • Práctica aplicada a tu trabajo desde la primera sesión\n\
             Si estás viendo otra alternativa, dime cuál y la comparamos punto por punto.",
            render::render_text(course.name.as_deref()),
            render::render_count(course.session_count),
            render::render_duration(course.total_duration_min),
            render::render_price(course.price, course.currency.as_deref()),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Text { content })
    }
}

/// Time objection: session-level durations show the real weekly load.
pub struct HandleTimeObjection;

#[async_trait::async_trait]
impl SalesTool for HandleTimeObjection {
    fn id(&self) -> ToolId {
        ToolId::HandleTimeObjection
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: TIME_SAFE_COPY.to_string() });
        };
        let sessions = ctx.catalog.list_sessions(course_id)?;
        let durations: Vec<i64> = sessions.iter().filter_map(|s| s.duration_minutes).collect();
        if durations.is_empty() {
            return Ok(ToolResult::Failed { content: TIME_SAFE_COPY.to_string() });
        }
        let avg = durations.iter().sum::<i64>() / durations.len() as i64;

        let content = format!(
            "Justo por eso el programa está partido en sesiones cortas: son {} sesiones de {} \
             en promedio, y las grabaciones quedan disponibles para verlas cuando puedas. \
             Con un par de horas a la semana avanzas sin sacrificar tu agenda.",
            sessions.len(),
            render::render_duration(Some(avg)),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "avg_session_minutes": avg }),
        )?;

        Ok(ToolResult::Text { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{empty_catalog, profile, seeded_catalog};

    #[tokio::test]
    async fn time_objection_quotes_average_session_length() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = HandleTimeObjection.execute(&ctx).await.unwrap();
        // (40 + 45 + 50) / 3 = 45
        assert!(result.content().contains("45m"));
        assert!(result.content().contains("3 sesiones"));
    }

    #[tokio::test]
    async fn competitor_comparison_uses_catalog_numbers_only() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowCompetitorComparison.execute(&ctx).await.unwrap();
        assert!(result.content().contains("$297 USD"));
        assert!(result.content().contains("8h"));
    }

    #[tokio::test]
    async fn guarantee_degrades_safely_without_course() {
        let catalog = empty_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowGuarantee.execute(&ctx).await.unwrap();
        assert!(result.is_failed());
    }
}
