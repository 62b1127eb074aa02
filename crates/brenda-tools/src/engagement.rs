//! Engagement tools: community, learning-by-doing overview, and the results
//! timeline.

use brenda_core::render;
use brenda_core::{BoxError, SalesTool, ToolContext, ToolId, ToolResult};

const COMMUNITY_SAFE_COPY: &str =
    "La comunidad de alumnos se abre con tu inscripción; si quieres conocerla antes, un asesor te la enseña.";

const GAMIFICATION_SAFE_COPY: &str =
    "Te preparo el detalle de prácticas y entregables del programa y te lo comparto enseguida.";

const TIMELINE_SAFE_COPY: &str =
    "Déjame armarte la línea de tiempo del programa con fechas reales y te la mando.";

/// Community access framing, personalised with the course name.
pub struct ConnectToCommunity;

#[async_trait::async_trait]
impl SalesTool for ConnectToCommunity {
    fn id(&self) -> ToolId {
        ToolId::ConnectToCommunity
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: COMMUNITY_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: COMMUNITY_SAFE_COPY.to_string() });
        };

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Text {
            content: format!(
                "Al inscribirte a {} entras también a la comunidad privada de alumnos: ahí se \
                 comparten dudas, avances y plantillas entre sesiones, con acompañamiento del \
                 equipo. No aprendes en solitario.",
                render::render_text(course.name.as_deref())
            ),
        })
    }
}

/// Learning-by-doing overview: counts the real practices and deliverables.
pub struct GamificationOverview;

#[async_trait::async_trait]
impl SalesTool for GamificationOverview {
    fn id(&self) -> ToolId {
        ToolId::GamificationOverview
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: GAMIFICATION_SAFE_COPY.to_string() });
        };
        let sessions = ctx.catalog.list_sessions(course_id)?;
        let mut practices = 0usize;
        let mut deliverables = 0usize;
        for session in &sessions {
            practices += ctx.catalog.list_practices(&session.id)?.len();
            deliverables += ctx.catalog.list_deliverables(&session.id)?.len();
        }
        if practices == 0 && deliverables == 0 {
            return Ok(ToolResult::Failed { content: GAMIFICATION_SAFE_COPY.to_string() });
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "practices": practices, "deliverables": deliverables }),
        )?;

        Ok(ToolResult::Text {
            content: format!(
                "Aquí no solo ves clases: el programa tiene {} prácticas guiadas y {} entregables \
                 reales, así que terminas cada sesión con algo construido y avanzas nivel a nivel.",
                practices, deliverables
            ),
        })
    }
}

/// Results timeline from the session plan: what the user is doing first and
/// how long the whole program takes.
pub struct ResultsTimeline;

#[async_trait::async_trait]
impl SalesTool for ResultsTimeline {
    fn id(&self) -> ToolId {
        ToolId::ResultsTimeline
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: TIMELINE_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: TIMELINE_SAFE_COPY.to_string() });
        };
        let sessions = ctx.catalog.list_sessions(course_id)?;
        let Some(first) = sessions.first() else {
            return Ok(ToolResult::Failed { content: TIMELINE_SAFE_COPY.to_string() });
        };

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "sessions": sessions.len() }),
        )?;

        Ok(ToolResult::Text {
            content: format!(
                "Así se ve tu avance: desde la primera sesión (\"{}\") sales aplicando, y el \
                 programa completo son {} sesiones con {} de contenido. En cuestión de semanas \
                 ya estás usando IA en tu trabajo diario.",
                render::render_text(first.title.as_deref()),
                sessions.len(),
                render::render_duration(course.total_duration_min),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{empty_catalog, profile, seeded_catalog};

    #[tokio::test]
    async fn gamification_counts_practices_and_deliverables() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = GamificationOverview.execute(&ctx).await.unwrap();
        assert!(result.content().contains("2 prácticas"));
        assert!(result.content().contains("1 entregables"));
    }

    #[tokio::test]
    async fn timeline_quotes_first_session_and_total_duration() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ResultsTimeline.execute(&ctx).await.unwrap();
        assert!(result.content().contains("Fundamentos de IA"));
        assert!(result.content().contains("8h"));
    }

    #[tokio::test]
    async fn empty_plan_degrades_to_safe_copy() {
        let catalog = empty_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        assert!(GamificationOverview.execute(&ctx).await.unwrap().is_failed());
        assert!(ResultsTimeline.execute(&ctx).await.unwrap().is_failed());
    }
}
