//! Social-proof tools: testimonials, similar success cases, and adoption
//! numbers. Specific figures only come from catalog rows (video resources,
//! bonus claim counters); everything else stays qualitative.

use brenda_core::render;
use brenda_core::{
    BoxError, ResourceKind, SalesTool, ToolContext, ToolId, ToolResource, ToolResult,
};

const TESTIMONIALS_SAFE_COPY: &str =
    "Estoy reuniendo testimonios recientes de alumnos; si quieres, un asesor te comparte casos de tu mismo perfil.";

const SUCCESS_SAFE_COPY: &str =
    "Cuéntame a qué te dedicas y te muestro cómo personas con tu perfil están aplicando el programa.";

const SOCIAL_SAFE_COPY: &str =
    "Déjame traerte los números actualizados de la comunidad y te los comparto.";

/// Shares testimonial videos published as free resources of the course.
pub struct ShowTestimonials;

#[async_trait::async_trait]
impl SalesTool for ShowTestimonials {
    fn id(&self) -> ToolId {
        ToolId::ShowTestimonials
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: TESTIMONIALS_SAFE_COPY.to_string() });
        };
        let rows = ctx.catalog.list_free_resources(course_id)?;
        let videos: Vec<ToolResource> = rows
            .iter()
            .filter(|r| r.resource_type.as_deref().map(|t| t.eq_ignore_ascii_case("video")).unwrap_or(false))
            .filter_map(|r| {
                r.resource_url.clone().map(|url| ToolResource {
                    kind: ResourceKind::Video,
                    url,
                    caption: r.resource_name.clone(),
                })
            })
            .collect();
        if videos.is_empty() {
            return Ok(ToolResult::Failed { content: TESTIMONIALS_SAFE_COPY.to_string() });
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "videos": videos.len() }),
        )?;

        Ok(ToolResult::Multimedia {
            content: "Mira lo que dicen alumnos del programa:".to_string(),
            resources: videos,
        })
    }
}

/// Connects the course to the user's own profile (role, interests) without
/// inventing outcomes.
pub struct ShowSimilarSuccessCases;

#[async_trait::async_trait]
impl SalesTool for ShowSimilarSuccessCases {
    fn id(&self) -> ToolId {
        ToolId::ShowSimilarSuccessCases
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: SUCCESS_SAFE_COPY.to_string() });
        };
        let Some(course) = ctx.catalog.get_course(course_id)? else {
            return Ok(ToolResult::Failed { content: SUCCESS_SAFE_COPY.to_string() });
        };

        let audience = course
            .audience_category
            .clone()
            .or_else(|| ctx.profile.traits.role.clone());
        let content = match audience {
            Some(aud) => format!(
                "{} está pensado justo para {}: el temario parte de casos reales de ese perfil \
                 y cada sesión termina en algo aplicable a tu trabajo. Si me cuentas tu caso, \
                 te digo qué sesiones te darán resultados primero.",
                render::render_text(course.name.as_deref()),
                aud
            ),
            None => format!(
                "{} está diseñado para aplicarse desde la primera sesión. Cuéntame a qué te \
                 dedicas y te digo qué partes del temario te darán resultados primero.",
                render::render_text(course.name.as_deref())
            ),
        };

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Text { content })
    }
}

/// Adoption numbers grounded on bonus claim counters.
pub struct ShowSocialProof;

#[async_trait::async_trait]
impl SalesTool for ShowSocialProof {
    fn id(&self) -> ToolId {
        ToolId::ShowSocialProof
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: SOCIAL_SAFE_COPY.to_string() });
        };
        let bonuses = ctx.catalog.list_bonuses(course_id)?;
        let claimed: i64 = bonuses.iter().filter_map(|b| b.current_claims).sum();
        if claimed <= 0 {
            return Ok(ToolResult::Failed { content: SOCIAL_SAFE_COPY.to_string() });
        }

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "claimed": claimed }),
        )?;

        Ok(ToolResult::Text {
            content: format!(
                "Solo en esta convocatoria, {} personas ya reclamaron los bonos de inscripción. \
                 El grupo avanza junto y eso se nota en los resultados.",
                claimed
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{empty_catalog, profile, seeded_catalog};

    #[tokio::test]
    async fn testimonials_attach_video_resources() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowTestimonials.execute(&ctx).await.unwrap();
        assert_eq!(result.resources().len(), 1);
        assert_eq!(result.resources()[0].kind, ResourceKind::Video);
    }

    #[tokio::test]
    async fn social_proof_uses_claim_counters() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowSocialProof.execute(&ctx).await.unwrap();
        assert!(result.content().contains("18"));
    }

    #[tokio::test]
    async fn no_evidence_degrades_without_invented_numbers() {
        let catalog = empty_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowSocialProof.execute(&ctx).await.unwrap();
        assert!(result.is_failed());
        assert!(!result.content().chars().any(|c| c.is_ascii_digit()));
    }
}
