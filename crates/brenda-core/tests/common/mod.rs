//! Shared fixtures for the end-to-end scenarios: seeded catalog, stub email
//! gateway, and a fully wired turn engine (rule-based analysis, no live
//! LLM).

use brenda_core::{
    BotConfig, CatalogGateway, CoreError, EmailGateway, HandoffFlow, InboundEvent, MemoryStore,
    TurnEngine,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub const USER: i64 = 1001;

pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub struct StubEmail {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: bool,
}

impl StubEmail {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()), fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()), fail: true })
    }
}

#[async_trait::async_trait]
impl EmailGateway for StubEmail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CoreError> {
        if self.fail {
            return Err(CoreError::Email("stub transport down".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct SeedOptions {
    pub sessions: bool,
    pub free_resources: bool,
    pub bonuses: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self { sessions: true, free_resources: true, bonuses: true }
    }
}

pub fn seeded_connection(options: &SeedOptions) -> Connection {
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

         INSERT INTO courses VALUES ('experto-ia-gpt-gemini', 'Experto en IA con GPT y Gemini', \
             'Domina GPT y Gemini aplicados a tu trabajo', 'Programa completo', 'intermedio', \
             '297.00', 'USD', '480', 12, 'active', NULL, 'https://cdn.example.com/temario.pdf', \
             'https://example.com/experto-ia', 'https://example.com/comprar', 'profesionales');
         INSERT INTO payment_info VALUES ('Formación IA SA de CV', 'BBVA', \
             '012345678901234567', 'FIA240101XX0', 'G03', 'Gastos en general', 1);",
    )
    .unwrap();

    if options.sessions {
        conn.execute_batch(
            "INSERT INTO sessions VALUES ('s1', 'experto-ia-gpt-gemini', 1, 'Fundamentos de IA', \
                 'Entender los modelos', '40', 'online');
             INSERT INTO sessions VALUES ('s2', 'experto-ia-gpt-gemini', 2, 'Prompting avanzado', \
                 'Dominar prompts', '45', 'online');",
        )
        .unwrap();
    }
    if options.free_resources {
        conn.execute_batch(
            "INSERT INTO free_resources VALUES ('f1', 'experto-ia-gpt-gemini', 'Guía de prompts', \
                 'guide', 'https://cdn.example.com/guia.pdf', 'Guía introductoria', 1);
             INSERT INTO free_resources VALUES ('f2', 'experto-ia-gpt-gemini', 'Plantilla de flujos', \
                 'template', 'https://cdn.example.com/plantilla.pdf', 'Plantilla editable', 1);",
        )
        .unwrap();
    }
    if options.bonuses {
        conn.execute_batch(
            "INSERT INTO bonuses VALUES ('b1', 'experto-ia-gpt-gemini', 'Sesión de mentoría 1:1', \
                 'Una hora con un mentor', '150', '2026-09-30', 50, 18, 1);",
        )
        .unwrap();
    }
    conn
}

pub struct Harness {
    pub engine: TurnEngine,
    pub memory: Arc<MemoryStore>,
    pub catalog: Arc<CatalogGateway>,
    pub email: Arc<StubEmail>,
    _dir: tempfile::TempDir,
}

pub fn harness_with(options: SeedOptions, email: Arc<StubEmail>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(MemoryStore::open(dir.path().join("memory")).unwrap());
    let catalog = Arc::new(CatalogGateway::from_connection(seeded_connection(&options)).unwrap());
    let handoff = HandoffFlow::new(
        Some(email.clone() as Arc<dyn EmailGateway>),
        Some("asesor@example.com".to_string()),
    );
    let engine = TurnEngine::new(
        BotConfig::default(),
        memory.clone(),
        catalog.clone(),
        None,
        Arc::new(brenda_tools::default_registry()),
        handoff,
    );
    Harness { engine, memory, catalog, email, _dir: dir }
}

pub fn harness() -> Harness {
    harness_with(SeedOptions::default(), StubEmail::ok())
}

/// Runs the campaign-entry preamble up to free dialogue.
pub async fn run_preamble(harness: &Harness) {
    let events = [
        InboundEvent::text_message(USER, "María", "#Experto_IA_GPT_Gemini #ADSIM_01", 1),
        InboundEvent::callback(USER, "María", "privacy_accept", 2),
        InboundEvent::text_message(USER, "María", "María González", 3),
    ];
    for event in events {
        harness.engine.handle_event(event).await;
    }
}
