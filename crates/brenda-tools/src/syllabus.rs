//! Content-exploration tools: syllabus display and course preview.

use brenda_core::render;
use brenda_core::{
    BoxError, ResourceKind, SalesTool, ToolContext, ToolId, ToolResource, ToolResult,
};

const SYLLABUS_SAFE_COPY: &str =
    "Estoy actualizando el temario de este programa; en cuanto lo tenga listo te lo comparto.";

const PREVIEW_SAFE_COPY: &str =
    "Aún no tengo una vista previa disponible de este curso, pero puedo resolverte cualquier duda por aquí.";

/// Lists the course sessions (short view, capped) and attaches the syllabus
/// document when the course carries one.
pub struct ShowSyllabus;

#[async_trait::async_trait]
impl SalesTool for ShowSyllabus {
    fn id(&self) -> ToolId {
        ToolId::ShowSyllabus
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: SYLLABUS_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: SYLLABUS_SAFE_COPY.to_string() });
        };
        let sessions = ctx.catalog.list_sessions(course_id)?;
        if sessions.is_empty() {
            return Ok(ToolResult::Failed { content: SYLLABUS_SAFE_COPY.to_string() });
        }

        let mut lines = vec![format!(
            "Esto es lo que aprenderás en {}:",
            render::render_text(course.name.as_deref())
        )];
        for session in sessions.iter().take(render::SHORT_VIEW_SESSION_CAP) {
            lines.push(format!(
                "{}. {} — {}",
                render::render_count(session.session_index),
                render::render_text(session.title.as_deref()),
                render::render_duration(session.duration_minutes),
            ));
        }
        if sessions.len() > render::SHORT_VIEW_SESSION_CAP {
            lines.push(format!(
                "…y {} sesiones más en el temario completo.",
                sessions.len() - render::SHORT_VIEW_SESSION_CAP
            ));
        }

        let mut resources = Vec::new();
        if let Some(url) = course.syllabus_url.as_deref().filter(|u| !u.trim().is_empty()) {
            resources.push(ToolResource {
                kind: ResourceKind::Document,
                url: url.to_string(),
                caption: Some("Temario completo".to_string()),
            });
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "sessions_listed": sessions.len().min(render::SHORT_VIEW_SESSION_CAP) }),
        )?;

        Ok(ToolResult::Multimedia { content: lines.join("\n"), resources })
    }
}

/// Shares the course landing/preview URL.
pub struct SendPreview;

#[async_trait::async_trait]
impl SalesTool for SendPreview {
    fn id(&self) -> ToolId {
        ToolId::SendPreview
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: PREVIEW_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: PREVIEW_SAFE_COPY.to_string() });
        };
        let Some(url) = course.course_url.clone().filter(|u| !u.trim().is_empty()) else {
            return Ok(ToolResult::Failed { content: PREVIEW_SAFE_COPY.to_string() });
        };

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Multimedia {
            content: format!(
                "Aquí puedes ver {} por dentro:",
                render::render_text(course.name.as_deref())
            ),
            resources: vec![ToolResource {
                kind: ResourceKind::Link,
                url,
                caption: Some("Vista previa del curso".to_string()),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{empty_catalog, logged_interactions, profile, seeded_catalog};

    #[tokio::test]
    async fn syllabus_lists_sessions_and_attaches_document() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowSyllabus.execute(&ctx).await.unwrap();
        assert!(result.content().contains("Fundamentos de IA"));
        assert!(result.content().contains("40m"));
        assert_eq!(result.resources().len(), 1);
        assert_eq!(logged_interactions(&catalog), vec!["show_syllabus"]);
    }

    #[tokio::test]
    async fn empty_catalog_degrades_to_safe_copy_without_logging() {
        let catalog = empty_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowSyllabus.execute(&ctx).await.unwrap();
        assert!(result.is_failed());
        assert!(result.resources().is_empty());
        assert!(logged_interactions(&catalog).is_empty());
    }

    #[tokio::test]
    async fn preview_links_the_course_url() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = SendPreview.execute(&ctx).await.unwrap();
        assert_eq!(result.resources().len(), 1);
        assert_eq!(result.resources()[0].url, "https://example.com/experto-ia");
    }
}
