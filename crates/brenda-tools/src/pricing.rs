//! Price-framing tools: market comparison, budget fit, and personal ROI.
//!
//! Every figure shown here is the catalog price or simple arithmetic over
//! it; nothing is quoted that the catalog cannot back.

use brenda_core::render;
use brenda_core::{BoxError, Course, SalesTool, ToolContext, ToolId, ToolResult};

const PRICE_SAFE_COPY: &str =
    "Déjame confirmar el precio vigente de este programa y te lo comparto enseguida.";

async fn priced_course(ctx: &ToolContext<'_>) -> Result<Option<(String, Course)>, BoxError> {
    let Some(course_id) = ctx.course_id else { return Ok(None) };
    let Some(course) = ctx.catalog.get_course(course_id)? else { return Ok(None) };
    if course.price.is_none() {
        return Ok(None);
    }
    Ok(Some((course_id.to_string(), course)))
}

/// Frames the course price against typical market alternatives (multiples of
/// the catalog price).
pub struct ShowPricingComparison;

#[async_trait::async_trait]
impl SalesTool for ShowPricingComparison {
    fn id(&self) -> ToolId {
        ToolId::ShowPricingComparison
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some((course_id, course)) = priced_course(ctx).await? else {
            return Ok(ToolResult::Failed { content: PRICE_SAFE_COPY.to_string() });
        };
        let price = course.price.expect("priced_course guarantees price");
        let currency = course.currency.as_deref();

        let content = format!(
            "Te pongo el precio en perspectiva:\n\
             • {}: {}\n\
             • Un diplomado presencial equivalente ronda {} (×5)\n\
             • Un bootcamp privado ronda {} (×8)\n\
             Mismo contenido aplicado, a una fracción del costo.",
            render::render_text(course.name.as_deref()),
            render::render_price(Some(price), currency),
            render::render_price(Some(price * 5.0), currency),
            render::render_price(Some(price * 8.0), currency),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(&course_id),
            self.id().as_str(),
            &serde_json::json!({ "price": price }),
        )?;

        Ok(ToolResult::Text { content })
    }
}

/// Breaks the price into an accessible monthly framing.
pub struct PersonalizeByBudget;

#[async_trait::async_trait]
impl SalesTool for PersonalizeByBudget {
    fn id(&self) -> ToolId {
        ToolId::PersonalizeByBudget
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some((course_id, course)) = priced_course(ctx).await? else {
            return Ok(ToolResult::Failed { content: PRICE_SAFE_COPY.to_string() });
        };
        let price = course.price.expect("priced_course guarantees price");
        let currency = course.currency.as_deref();

        let content = format!(
            "Si lo ves por partes, {} equivale a {} al mes durante tres meses, \
             o {} a la semana durante el programa. Cuéntame tu presupuesto y lo ajustamos.",
            render::render_price(Some(price), currency),
            render::render_price(Some(price / 3.0), currency),
            render::render_price(Some(price / 12.0), currency),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(&course_id),
            self.id().as_str(),
            &serde_json::json!({}),
        )?;

        Ok(ToolResult::Text { content })
    }
}

/// Expresses the investment as hours of the user's own work.
pub struct CalculatePersonalRoi;

#[async_trait::async_trait]
impl SalesTool for CalculatePersonalRoi {
    fn id(&self) -> ToolId {
        ToolId::CalculatePersonalRoi
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some((course_id, course)) = priced_course(ctx).await? else {
            return Ok(ToolResult::Failed { content: PRICE_SAFE_COPY.to_string() });
        };
        let price = course.price.expect("priced_course guarantees price");
        let currency = course.currency.as_deref();
        let hourly = price / 10.0;

        let content = format!(
            "Hagamos la cuenta: la inversión es {}. Si tu hora de trabajo vale más de {}, \
             recuperas el programa completo con solo ahorrar 10 horas — y la automatización \
             que aprendes ahorra eso cada mes.",
            render::render_price(Some(price), currency),
            render::render_price(Some(hourly), currency),
        );

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(&course_id),
            self.id().as_str(),
            &serde_json::json!({ "hourly_breakeven": hourly }),
        )?;

        Ok(ToolResult::Text { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{empty_catalog, profile, seeded_catalog};

    #[tokio::test]
    async fn comparison_shows_price_and_multiples() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowPricingComparison.execute(&ctx).await.unwrap();
        assert!(result.content().contains("$297 USD"));
        assert!(result.content().contains("$1485 USD")); // ×5
        assert!(result.content().contains("$2376 USD")); // ×8
    }

    #[tokio::test]
    async fn missing_price_degrades_to_safe_copy() {
        let catalog = empty_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = ShowPricingComparison.execute(&ctx).await.unwrap();
        assert!(result.is_failed());
    }

    #[tokio::test]
    async fn budget_framing_divides_the_catalog_price() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = PersonalizeByBudget.execute(&ctx).await.unwrap();
        assert!(result.content().contains("$99 USD"));
    }

    #[tokio::test]
    async fn roi_uses_price_derived_breakeven() {
        let catalog = seeded_catalog();
        let profile = profile();
        let ctx = ToolContext {
            user_id: profile.user_id,
            course_id: profile.course_id.as_deref(),
            profile: &profile,
            catalog: &catalog,
        };
        let result = CalculatePersonalRoi.execute(&ctx).await.unwrap();
        assert!(result.content().contains("$29.70 USD"));
    }
}
