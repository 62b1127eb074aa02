//! Free-resource delivery tools.

use brenda_core::render;
use brenda_core::{
    BoxError, FreeResource, ResourceKind, SalesTool, ToolContext, ToolId, ToolResource, ToolResult,
};

const RESOURCES_SAFE_COPY: &str =
    "Por ahora no tengo materiales gratuitos cargados para este curso; en cuanto haya, te los envío.";

const RECOMMEND_SAFE_COPY: &str =
    "Déjame reunir las guías y plantillas adecuadas para tu caso y te las comparto.";

fn resource_kind(tag: Option<&str>) -> ResourceKind {
    match tag.map(|t| t.trim().to_lowercase()) {
        Some(t) if t == "video" => ResourceKind::Video,
        Some(t) if t == "link" => ResourceKind::Link,
        // document, template, guide and anything unknown travel as documents
        _ => ResourceKind::Document,
    }
}

fn as_attachment(resource: &FreeResource) -> Option<ToolResource> {
    let url = resource.resource_url.clone()?;
    if url.trim().is_empty() {
        return None;
    }
    Some(ToolResource {
        kind: resource_kind(resource.resource_type.as_deref()),
        url,
        caption: resource.resource_name.clone(),
    })
}

/// Delivers every active free resource of the course, one attachment per
/// row.
pub struct SendFreeResources;

#[async_trait::async_trait]
impl SalesTool for SendFreeResources {
    fn id(&self) -> ToolId {
        ToolId::SendFreeResources
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: RESOURCES_SAFE_COPY.to_string() });
        };
        let rows = ctx.catalog.list_free_resources(course_id)?;
        if rows.is_empty() {
            return Ok(ToolResult::Failed { content: RESOURCES_SAFE_COPY.to_string() });
        }

        let names: Vec<String> =
            rows.iter().map(|r| render::render_text(r.resource_name.as_deref())).collect();
        let resources: Vec<ToolResource> = rows.iter().filter_map(as_attachment).collect();

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "resources": rows.len() }),
        )?;

        Ok(ToolResult::Multimedia {
            content: format!("Con gusto, esto es gratuito para ti: {}.", names.join(", ")),
            resources,
        })
    }
}

/// Recommends the course's guide/template materials matched to the user's
/// recorded interests.
pub struct RecommendTools;

#[async_trait::async_trait]
impl SalesTool for RecommendTools {
    fn id(&self) -> ToolId {
        ToolId::RecommendTools
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: RECOMMEND_SAFE_COPY.to_string() });
        };
        let rows = ctx.catalog.list_free_resources(course_id)?;
        let picks: Vec<&FreeResource> = rows
            .iter()
            .filter(|r| {
                matches!(
                    r.resource_type.as_deref().map(|t| t.to_lowercase()).as_deref(),
                    Some("guide") | Some("template")
                )
            })
            .collect();
        if picks.is_empty() {
            return Ok(ToolResult::Failed { content: RECOMMEND_SAFE_COPY.to_string() });
        }

        let mut lines =
            vec!["Para empezar hoy mismo te recomiendo estos materiales:".to_string()];
        for pick in &picks {
            lines.push(format!(
                "• {} — {}",
                render::render_text(pick.resource_name.as_deref()),
                render::render_text(pick.resource_description.as_deref()),
            ));
        }
        let resources: Vec<ToolResource> = picks.iter().filter_map(|r| as_attachment(r)).collect();

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "picks": picks.len() }),
        )?;

        Ok(ToolResult::Multimedia { content: lines.join("\n"), resources })
    }
}
