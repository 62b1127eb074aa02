//! Intake state machine: campaign parsing, privacy gate, name capture and
//! course presentation.
//!
//! Until privacy is accepted the only possible outbound parts are the
//! privacy prompt or the declined notice. A course id resolved from a
//! campaign deep-link is bound to the profile before the gate; the same gate
//! serves menu entries. Presentation only advances the stage once it has
//! actually been emitted — a catalog failure leaves the stage at
//! `course_presenting` so the next turn retries.

use crate::campaign::CampaignMap;
use crate::catalog::{CatalogGateway, Course};
use crate::composer::{Button, Reply, ReplyPart};
use crate::event::InboundEvent;
use crate::profile::{Stage, UserProfile};
use crate::render;

pub const CB_PRIVACY_ACCEPT: &str = "privacy_accept";
pub const CB_PRIVACY_DECLINE: &str = "privacy_decline";
pub const CB_PRIVACY_VIEW: &str = "privacy_view";
pub const CB_COURSE_PREFIX: &str = "course_";
pub const CB_COURSE_ASK: &str = "course_ask";
pub const CB_COURSE_PRICES: &str = "course_prices";
pub const CB_CONTACT_ADVISOR: &str = "contact_advisor";

/// Acknowledgements that keep the messenger-reported first name.
const NAME_ACKNOWLEDGEMENTS: [&str; 6] = ["está bien", "esta bien", "ok", "vale", "sí", "si"];

fn privacy_prompt(profile: &UserProfile) -> Reply {
    let intro = if profile.assistant_introduced {
        "Antes de continuar necesito tu consentimiento sobre el aviso de privacidad.".to_string()
    } else {
        format!(
            "¡Hola {}! Soy Brenda, asesora de formación en inteligencia artificial. \
             Antes de empezar necesito tu consentimiento sobre el aviso de privacidad.",
            profile.first_name
        )
    };
    Reply::text(intro).with_keyboard(vec![
        Button::new("Acepto", CB_PRIVACY_ACCEPT),
        Button::new("No acepto", CB_PRIVACY_DECLINE),
        Button::new("Ver aviso", CB_PRIVACY_VIEW),
    ])
}

fn declined_notice() -> Reply {
    Reply::text(
        "Entiendo, sin tu consentimiento no puedo continuar la conversación. \
         Si cambias de opinión, escribe \"menu\" y retomamos.",
    )
}

fn name_prompt(profile: &UserProfile) -> Reply {
    Reply::text(format!(
        "¡Gracias! ¿Cómo te gustaría que te llame? Si prefieres que use {}, responde \"está bien\".",
        profile.first_name
    ))
}

fn is_menu_command(event: &InboundEvent) -> bool {
    event
        .text
        .as_deref()
        .map(|t| t.trim().eq_ignore_ascii_case("menu"))
        .unwrap_or(false)
}

/// Formatted text card assembled from the course record. Null columns render
/// the neutral placeholder, numeric columns are coerced robustly.
pub fn course_card(course: &Course) -> String {
    format!(
        "📘 {}\n{}\n\nNivel: {}\nSesiones: {}\nDuración total: {}\nPrecio: {}",
        render::render_text(course.name.as_deref()),
        render::render_text(course.short_description.as_deref()),
        render::render_text(course.level.as_deref()),
        render::render_count(course.session_count),
        render::render_duration(course.total_duration_min),
        render::render_price(course.price, course.currency.as_deref()),
    )
}

fn presentation_menu() -> Vec<Button> {
    vec![
        Button::new("Hacer una pregunta", CB_COURSE_ASK),
        Button::new("Ver precios", CB_COURSE_PRICES),
        Button::new("Agendar llamada", CB_CONTACT_ADVISOR),
    ]
}

/// Emits the course presentation: syllabus document, promotional image
/// (fallback to the course URL), text card, and the three-button menu.
/// Advances the stage only on success.
fn present_course(profile: &mut UserProfile, catalog: &CatalogGateway) -> Reply {
    let Some(course_id) = profile.course_id.clone() else {
        return course_chooser(catalog);
    };
    let course = match catalog.get_course(&course_id) {
        Ok(Some(c)) => c,
        Ok(None) => {
            tracing::warn!(course_id, "presentation requested for unknown course");
            profile.course_id = None;
            return course_chooser(catalog);
        }
        Err(e) => {
            // Stage stays at course_presenting; the next turn retries.
            tracing::warn!("catalog unavailable during presentation: {}", e);
            return Reply::text(
                "Estoy preparando la información del curso, dame un momento y vuelve a escribirme.",
            );
        }
    };

    let mut reply = Reply::empty();
    if let Some(url) = course.syllabus_url.as_deref().filter(|u| !u.trim().is_empty()) {
        reply.push(ReplyPart::Document {
            url: url.to_string(),
            caption: Some("Temario del curso".to_string()),
        });
    }
    if let Some(url) = course.course_url.as_deref().filter(|u| !u.trim().is_empty()) {
        reply.push(ReplyPart::Image { url: url.to_string(), caption: None });
    }
    reply.push(ReplyPart::Text {
        content: format!("{}, este es el curso que tengo para ti:\n\n{}", profile.display_name(), course_card(&course)),
    });
    let mut reply = reply.with_keyboard(presentation_menu());
    reply.typing_delay_ms = Some(1500);

    profile.course_presented = true;
    let _ = profile.advance_stage(Stage::FreeDialogue);
    reply
}

/// Menu-entry users without a bound course pick one here.
fn course_chooser(catalog: &CatalogGateway) -> Reply {
    let courses = catalog.search_courses("").unwrap_or_default();
    if courses.is_empty() {
        return Reply::text(
            "Por ahora no tengo cursos disponibles para mostrarte, inténtalo más tarde.",
        );
    }
    let buttons = courses
        .iter()
        .take(3)
        .map(|c| {
            Button::new(
                render::render_text(c.name.as_deref()),
                format!("{}{}", CB_COURSE_PREFIX, c.id),
            )
        })
        .collect();
    Reply::text("¿Cuál de estos programas te interesa?").with_keyboard(buttons)
}

/// Runs one intake turn. Only called while the preamble is incomplete.
pub fn handle(
    event: &InboundEvent,
    profile: &mut UserProfile,
    catalog: &CatalogGateway,
    campaigns: &CampaignMap,
) -> Reply {
    // "menu" escape is honoured anywhere past the privacy gate.
    if is_menu_command(event) && profile.privacy_accepted {
        let _ = profile.advance_stage(Stage::FreeDialogue);
        return Reply::text("Claro, dime qué necesitas:").with_keyboard(presentation_menu());
    }

    match profile.stage {
        Stage::Initial => {
            // Campaign deep-link: bind the course before the gate.
            if let Some(text) = event.text.as_deref() {
                if let Some(tag) = campaigns.parse(text) {
                    profile.course_id = campaigns.resolve(&tag.course_tag).map(str::to_string);
                    profile.campaign_source = tag.campaign_tag.clone();
                }
            }
            let reply = privacy_prompt(profile);
            profile.assistant_introduced = true;
            let _ = profile.advance_stage(Stage::PrivacyPending);
            reply
        }
        Stage::PrivacyPending => match event.callback_payload.as_deref() {
            Some(CB_PRIVACY_ACCEPT) => {
                profile.accept_privacy();
                let _ = profile.advance_stage(Stage::NamePending);
                name_prompt(profile)
            }
            Some(CB_PRIVACY_DECLINE) => {
                let _ = profile.advance_stage(Stage::Closed);
                declined_notice()
            }
            Some(CB_PRIVACY_VIEW) => Reply::text(
                "Puedes leer el aviso de privacidad completo en el sitio; en resumen, \
                 usamos tus datos solo para asesorarte sobre los cursos.",
            )
            .with_keyboard(vec![
                Button::new("Acepto", CB_PRIVACY_ACCEPT),
                Button::new("No acepto", CB_PRIVACY_DECLINE),
            ]),
            // Anything else re-prompts the gate.
            _ => privacy_prompt(profile),
        },
        Stage::NamePending => {
            let text = event.text.as_deref().unwrap_or("").trim();
            if text.is_empty() {
                return name_prompt(profile);
            }
            let lowered = text.to_lowercase();
            if !NAME_ACKNOWLEDGEMENTS.iter().any(|a| lowered == *a) {
                profile.preferred_name = Some(text.chars().take(60).collect());
            }
            profile.name_collected = true;
            let _ = profile.advance_stage(Stage::CoursePresenting);
            present_course(profile, catalog)
        }
        Stage::CoursePresenting => {
            // Course chooser callback or a retry after a catalog failure.
            if let Some(payload) = event.callback_payload.as_deref() {
                if let Some(course_id) = payload.strip_prefix(CB_COURSE_PREFIX) {
                    profile.course_id = Some(course_id.to_string());
                }
            }
            present_course(profile, catalog)
        }
        Stage::Closed => {
            if profile.privacy_accepted {
                Reply::text("Escribe \"menu\" cuando quieras retomar la conversación.")
            } else {
                declined_notice()
            }
        }
        // Free dialogue and handoff never reach intake.
        Stage::FreeDialogue | Stage::AdvisorHandoff => Reply::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn catalog_with_course() -> CatalogGateway {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE courses (id TEXT PRIMARY KEY, name TEXT, short_description TEXT, \
                 long_description TEXT, level TEXT, price TEXT, currency TEXT, \
                 total_duration_min TEXT, session_count INTEGER, status TEXT, subtheme_id TEXT, \
                 syllabus_url TEXT, course_url TEXT, purchase_url TEXT, audience_category TEXT);
             INSERT INTO courses VALUES ('experto-ia-gpt-gemini', 'Experto en IA con GPT y Gemini', \
                 'Domina GPT y Gemini aplicados a tu trabajo', NULL, 'intermedio', '297.00', 'USD', \
                 '480', 12, 'active', NULL, 'https://cdn.example.com/temario.pdf', \
                 'https://example.com/experto-ia', NULL, NULL);",
        )
        .unwrap();
        CatalogGateway::from_connection(conn).unwrap()
    }

    fn run_preamble(profile: &mut UserProfile, catalog: &CatalogGateway, map: &CampaignMap) {
        let deep_link =
            InboundEvent::text_message(1, "María", "#Experto_IA_GPT_Gemini #ADSIM_01", 1);
        handle(&deep_link, profile, catalog, map);
        let accept = InboundEvent::callback(1, "María", CB_PRIVACY_ACCEPT, 2);
        handle(&accept, profile, catalog, map);
    }

    #[test]
    fn campaign_entry_binds_course_and_gates_on_privacy() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);

        let deep_link =
            InboundEvent::text_message(1, "María", "#Experto_IA_GPT_Gemini #ADSIM_01", 1);
        let reply = handle(&deep_link, &mut profile, &catalog, &map);

        assert_eq!(profile.course_id.as_deref(), Some("experto-ia-gpt-gemini"));
        assert_eq!(profile.campaign_source.as_deref(), Some("adsim_01"));
        assert_eq!(profile.stage, Stage::PrivacyPending);
        assert!(!profile.privacy_accepted);
        let has_buttons = reply
            .parts
            .iter()
            .any(|p| matches!(p, ReplyPart::Keyboard { buttons } if buttons.len() == 3));
        assert!(has_buttons);
    }

    #[test]
    fn before_acceptance_only_privacy_parts_are_possible() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);
        handle(
            &InboundEvent::text_message(1, "María", "#Experto_IA_GPT_Gemini", 1),
            &mut profile,
            &catalog,
            &map,
        );
        // free text instead of a button tap: re-prompt, never course data
        let reply = handle(
            &InboundEvent::text_message(1, "María", "cuéntame del curso", 2),
            &mut profile,
            &catalog,
            &map,
        );
        assert!(reply.text_parts().any(|t| t.contains("privacidad")));
        assert!(!reply.text_parts().any(|t| t.contains("297")));
    }

    #[test]
    fn decline_closes_the_conversation() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);
        handle(
            &InboundEvent::text_message(1, "María", "hola", 1),
            &mut profile,
            &catalog,
            &map,
        );
        handle(
            &InboundEvent::callback(1, "María", CB_PRIVACY_DECLINE, 2),
            &mut profile,
            &catalog,
            &map,
        );
        assert_eq!(profile.stage, Stage::Closed);
    }

    #[test]
    fn acknowledgement_keeps_messenger_name() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);
        run_preamble(&mut profile, &catalog, &map);
        handle(
            &InboundEvent::text_message(1, "María", "está bien", 3),
            &mut profile,
            &catalog,
            &map,
        );
        assert!(profile.name_collected);
        assert!(profile.preferred_name.is_none());
        assert_eq!(profile.display_name(), "María");
    }

    #[test]
    fn name_reply_presents_course_with_document_card_and_menu() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);
        run_preamble(&mut profile, &catalog, &map);

        let reply = handle(
            &InboundEvent::text_message(1, "María", "María González", 3),
            &mut profile,
            &catalog,
            &map,
        );

        assert_eq!(profile.preferred_name.as_deref(), Some("María González"));
        assert_eq!(profile.stage, Stage::FreeDialogue);
        assert!(profile.course_presented);

        assert!(matches!(reply.parts[0], ReplyPart::Document { .. }));
        assert!(reply.text_parts().any(|t| t.contains("$297 USD")));
        assert!(reply
            .parts
            .iter()
            .any(|p| matches!(p, ReplyPart::Keyboard { buttons } if buttons.len() == 3)));
    }

    #[test]
    fn null_columns_render_placeholder_in_card() {
        let course = Course { id: "x".to_string(), ..Course::default() };
        let card = course_card(&course);
        assert!(card.contains(render::PLACEHOLDER));
        assert!(!card.contains("null"));
    }

    #[test]
    fn menu_command_reopens_free_dialogue_after_acceptance() {
        let catalog = catalog_with_course();
        let map = CampaignMap::builtin();
        let mut profile = UserProfile::new(1, "María", None);
        run_preamble(&mut profile, &catalog, &map);
        let reply = handle(
            &InboundEvent::text_message(1, "María", "menu", 3),
            &mut profile,
            &catalog,
            &map,
        );
        assert_eq!(profile.stage, Stage::FreeDialogue);
        assert!(reply.parts.iter().any(|p| matches!(p, ReplyPart::Keyboard { .. })));
    }
}
