//! Shared fixtures for tool tests: a seeded in-memory catalog and a
//! free-dialogue profile.

use brenda_core::{CatalogGateway, UserProfile};
use rusqlite::Connection;

pub const COURSE_ID: &str = "experto-ia";
pub const USER_ID: i64 = 77;

pub fn seeded_catalog() -> CatalogGateway {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE courses (id TEXT PRIMARY KEY, name TEXT, short_description TEXT, \
             long_description TEXT, level TEXT, price TEXT, currency TEXT, \
             total_duration_min TEXT, session_count INTEGER, status TEXT, subtheme_id TEXT, \
             syllabus_url TEXT, course_url TEXT, purchase_url TEXT, audience_category TEXT);
         CREATE TABLE sessions (id TEXT, course_id TEXT, session_index INTEGER, title TEXT, \
             objective TEXT, duration_minutes TEXT, modality TEXT);
         CREATE TABLE practices (id TEXT, session_id TEXT, practice_index INTEGER, title TEXT, \
             description TEXT, duration TEXT, is_mandatory INTEGER, resource_type TEXT);
         CREATE TABLE deliverables (id TEXT, session_id TEXT, name TEXT, type TEXT, \
             resource_url TEXT, is_mandatory INTEGER);
         CREATE TABLE bonuses (id TEXT, course_id TEXT, name TEXT, description TEXT, \
             original_value TEXT, expires_at TEXT, max_claims INTEGER, current_claims INTEGER, \
             active INTEGER);
         CREATE TABLE free_resources (id TEXT, course_id TEXT, resource_name TEXT, \
             resource_type TEXT, resource_url TEXT, resource_description TEXT, active INTEGER);
         CREATE TABLE payment_info (company_name TEXT, bank_name TEXT, clabe_account TEXT, \
             rfc TEXT, cfdi_usage TEXT, cfdi_description TEXT, is_active INTEGER);

         INSERT INTO courses VALUES ('experto-ia', 'Experto en IA con GPT y Gemini', \
             'Domina GPT y Gemini aplicados a tu trabajo', 'Programa completo', 'intermedio', \
             '297.00', 'USD', '480', 3, 'active', NULL, 'https://cdn.example.com/temario.pdf', \
             'https://example.com/experto-ia', 'https://example.com/comprar', 'profesionales');
         INSERT INTO sessions VALUES ('s1', 'experto-ia', 1, 'Fundamentos de IA', \
             'Entender los modelos', '40', 'online');
         INSERT INTO sessions VALUES ('s2', 'experto-ia', 2, 'Prompting avanzado', \
             'Dominar prompts', '45', 'online');
         INSERT INTO sessions VALUES ('s3', 'experto-ia', 3, 'Automatización de procesos', \
             'Automatizar tareas repetitivas', '50', 'online');
         INSERT INTO practices VALUES ('p1', 's1', 1, 'Primer prompt', 'Escribe tu primer prompt', \
             '15', 1, 'document');
         INSERT INTO practices VALUES ('p2', 's2', 1, 'Cadena de prompts', 'Encadena tareas', \
             '20', 1, 'document');
         INSERT INTO deliverables VALUES ('d1', 's3', 'Flujo automatizado', 'project', NULL, 1);
         INSERT INTO bonuses VALUES ('b1', 'experto-ia', 'Sesión de mentoría 1:1', \
             'Una hora con un mentor', '150', '2026-09-30', 50, 18, 1);
         INSERT INTO free_resources VALUES ('f1', 'experto-ia', 'Guía de prompts', 'guide', \
             'https://cdn.example.com/guia.pdf', 'Guía introductoria', 1);
         INSERT INTO free_resources VALUES ('f2', 'experto-ia', 'Clase muestra', 'video', \
             'https://cdn.example.com/muestra.mp4', 'Video de muestra', 1);
         INSERT INTO payment_info VALUES ('Formación IA SA de CV', 'BBVA', \
             '012345678901234567', 'FIA240101XX0', 'G03', 'Gastos en general', 1);",
    )
    .unwrap();
    CatalogGateway::from_connection(conn).unwrap()
}

/// Catalog with the schema but no rows: the safe-copy path.
pub fn empty_catalog() -> CatalogGateway {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE courses (id TEXT PRIMARY KEY, name TEXT, short_description TEXT, \
             long_description TEXT, level TEXT, price TEXT, currency TEXT, \
             total_duration_min TEXT, session_count INTEGER, status TEXT, subtheme_id TEXT, \
             syllabus_url TEXT, course_url TEXT, purchase_url TEXT, audience_category TEXT);
         CREATE TABLE sessions (id TEXT, course_id TEXT, session_index INTEGER, title TEXT, \
             objective TEXT, duration_minutes TEXT, modality TEXT);
         CREATE TABLE practices (id TEXT, session_id TEXT, practice_index INTEGER, title TEXT, \
             description TEXT, duration TEXT, is_mandatory INTEGER, resource_type TEXT);
         CREATE TABLE deliverables (id TEXT, session_id TEXT, name TEXT, type TEXT, \
             resource_url TEXT, is_mandatory INTEGER);
         CREATE TABLE bonuses (id TEXT, course_id TEXT, name TEXT, description TEXT, \
             original_value TEXT, expires_at TEXT, max_claims INTEGER, current_claims INTEGER, \
             active INTEGER);
         CREATE TABLE free_resources (id TEXT, course_id TEXT, resource_name TEXT, \
             resource_type TEXT, resource_url TEXT, resource_description TEXT, active INTEGER);
         CREATE TABLE payment_info (company_name TEXT, bank_name TEXT, clabe_account TEXT, \
             rfc TEXT, cfdi_usage TEXT, cfdi_description TEXT, is_active INTEGER);",
    )
    .unwrap();
    CatalogGateway::from_connection(conn).unwrap()
}

pub fn profile() -> UserProfile {
    let mut p = UserProfile::new(USER_ID, "Laura", None);
    p.accept_privacy();
    p.course_id = Some(COURSE_ID.to_string());
    p
}

/// Interaction types logged for this user.
pub fn logged_interactions(catalog: &CatalogGateway) -> Vec<String> {
    catalog
        .interactions_for(USER_ID)
        .unwrap()
        .into_iter()
        .map(|(_, t)| t)
        .collect()
}
