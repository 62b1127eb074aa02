//! Automation-need discovery: connects what the user wants to automate with
//! the sessions that actually teach it.

use brenda_core::render;
use brenda_core::{BoxError, SalesTool, ToolContext, ToolId, ToolResult};

const AUTOMATION_SAFE_COPY: &str =
    "Cuéntame qué tareas repetitivas te quitan más tiempo y te digo exactamente cómo atacarlas.";

pub struct DetectAutomationNeeds;

#[async_trait::async_trait]
impl SalesTool for DetectAutomationNeeds {
    fn id(&self) -> ToolId {
        ToolId::DetectAutomationNeeds
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> Result<ToolResult, BoxError> {
        let Some(course_id) = ctx.course_id else {
            return Ok(ToolResult::Failed { content: AUTOMATION_SAFE_COPY.to_string() });
        };
        let sessions = ctx.catalog.list_sessions(course_id)?;
        let matching: Vec<String> = sessions
            .iter()
            .filter(|s| {
                let haystack = format!(
                    "{} {}",
                    s.title.as_deref().unwrap_or(""),
                    s.objective.as_deref().unwrap_or("")
                )
                .to_lowercase();
                haystack.contains("automat") || haystack.contains("proceso") || haystack.contains("flujo")
            })
            .map(|s| render::render_text(s.title.as_deref()))
            .collect();

        if matching.is_empty() {
            return Ok(ToolResult::Failed { content: AUTOMATION_SAFE_COPY.to_string() });
        }

        let mut content = String::from(
            "¿Qué tareas repetitivas te quitan más tiempo hoy: reportes, correos, captura de datos? \
             Te lo pregunto porque el programa lo trabaja de frente en estas sesiones:\n",
        );
        for title in &matching {
            content.push_str(&format!("• {}\n", title));
        }
        content.push_str("Cuéntame tu caso y te digo cuál te conviene ver primero.");

        ctx.catalog.log_interaction(
            ctx.user_id,
            Some(course_id),
            self.id().as_str(),
            &serde_json::json!({ "matching_sessions": matching.len() }),
        )?;

        Ok(ToolResult::Text { content })
    }
}
