//! Application context.
//!
//! `CoreState` owns everything a running app needs: the store
//! connection, the session, the access-token registry, the doctor
//! workspace, the advisory bridge and the in-memory chat history. It is
//! opened explicitly and closed explicitly; there is no global state.

use chrono::{DateTime, Local, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::access::{AccessError, AccessTokenRegistry, DoctorAccess, PatientMatch};
use crate::advisory::{AdvisoryBridge, AdvisoryError, LlmClient, OllamaClient};
use crate::config::AppConfig;
use crate::db::{self, DatabaseError};
use crate::home::{self, HomeData};
use crate::models::enums::Role;
use crate::models::{HealthRecord, MedicalProblem, Scheme};
use crate::records::{self, EditError, EntryChange, ProfileUpdate, RecordEntry};
use crate::session::{PhoneChallenge, RegistrationForm, SessionError, SessionManager, SessionPointer};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No user is signed in")]
    NotAuthenticated,
    #[error("This action requires a {0} account")]
    WrongRole(Role),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Advisory client error: {0}")]
    Advisory(#[from] AdvisoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of the chat shown in this session. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct CoreState<C: LlmClient = OllamaClient> {
    config: AppConfig,
    conn: Connection,
    session: SessionManager,
    tokens: AccessTokenRegistry,
    doctor: Option<DoctorAccess>,
    advisory: AdvisoryBridge<C>,
    chat: Vec<ChatMessage>,
}

impl CoreState<OllamaClient> {
    /// Open the store under `config.data_dir`, restore any previous
    /// session and connect the advisory bridge to Ollama.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let client = OllamaClient::new(&config.ollama_url, config.llm_timeout_secs)?;
        Self::open_with_client(config, client)
    }
}

impl<C: LlmClient> CoreState<C> {
    pub fn open_with_client(config: AppConfig, client: C) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.database_path())?;
        let mut session = SessionManager::new(SessionPointer::new(config.session_pointer_path()));
        session.restore(&conn)?;

        let mut state = Self {
            advisory: AdvisoryBridge::new(client, config.model.clone()),
            config,
            conn,
            session,
            tokens: AccessTokenRegistry::new(),
            doctor: None,
            chat: Vec::new(),
        };
        state.on_signed_in()?;
        tracing::info!(
            version = crate::config::APP_VERSION,
            authenticated = state.session.is_authenticated(),
            "core state opened"
        );
        Ok(state)
    }

    /// Close any open grant and release the store.
    pub fn close(mut self) -> Result<(), CoreError> {
        if let Some(access) = self.doctor.as_mut() {
            access.revoke(&self.conn)?;
        }
        self.conn
            .close()
            .map_err(|(_, e)| DatabaseError::from(e))?;
        tracing::info!("core state closed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn advisory(&self) -> &AdvisoryBridge<C> {
        &self.advisory
    }

    // ── Session ─────────────────────────────────────────────

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn current_record(&self) -> Option<&HealthRecord> {
        self.session.current()
    }

    pub fn register(&mut self, form: RegistrationForm, role: Role) -> Result<&HealthRecord, CoreError> {
        self.session.register(&self.conn, form, role)?;
        self.switch_user()?;
        self.require_record()
    }

    pub fn login(&mut self, identifier: &str, role: Role) -> Result<&HealthRecord, CoreError> {
        self.session.login(&self.conn, identifier, role)?;
        self.switch_user()?;
        self.require_record()
    }

    pub fn begin_phone_login(&self, phone: &str, role: Role) -> Result<PhoneChallenge, CoreError> {
        Ok(self.session.begin_phone_login(&self.conn, phone, role)?)
    }

    pub fn complete_phone_login(
        &mut self,
        challenge: &PhoneChallenge,
        code: &str,
    ) -> Result<&HealthRecord, CoreError> {
        self.session.complete_phone_login(&self.conn, challenge, code)?;
        self.switch_user()?;
        self.require_record()
    }

    /// Sign out. A doctor's open grant is revoked first.
    pub fn logout(&mut self) -> Result<(), CoreError> {
        self.sign_out_quietly()?;
        self.session.logout()?;
        Ok(())
    }

    // ── Owner edits ─────────────────────────────────────────

    pub fn upsert_entry<E: RecordEntry>(&mut self, entry: E) -> Result<EntryChange, CoreError> {
        Ok(self.session.upsert_entry(&self.conn, entry)?)
    }

    pub fn remove_entry<E: RecordEntry>(&mut self, id: &str) -> Result<E, CoreError> {
        Ok(self.session.remove_entry(&self.conn, id)?)
    }

    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<(), CoreError> {
        Ok(self.session.update_profile(&self.conn, update)?)
    }

    /// Reload the signed-in record, picking up writes made under a
    /// doctor's grant.
    pub fn refresh(&mut self) -> Result<(), CoreError> {
        Ok(self.session.refresh(&self.conn)?)
    }

    // ── Patient side of access grants ───────────────────────

    /// Issue a one-time code the patient reads out to their doctor.
    pub fn issue_access_token(&mut self) -> Result<String, CoreError> {
        let record = self.require_record()?;
        if !record.is_patient() {
            return Err(CoreError::WrongRole(Role::Patient));
        }
        let health_id = record.health_id().to_string();
        Ok(self.tokens.issue(&health_id))
    }

    pub fn cancel_access_token(&mut self) -> Result<bool, CoreError> {
        let health_id = self.require_record()?.health_id().to_string();
        Ok(self.tokens.cancel(&health_id))
    }

    // ── Doctor side of access grants ────────────────────────

    pub fn search_patients(&mut self, query: &str) -> Result<Vec<PatientMatch>, CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        Ok(access.search(&self.conn, query)?.to_vec())
    }

    pub fn select_patient(&mut self, health_id: &str) -> Result<PatientMatch, CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        Ok(access.select(&self.conn, health_id)?)
    }

    pub fn verify_access_token(&mut self, code: &str) -> Result<&HealthRecord, CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        access.verify_token(&self.conn, &mut self.tokens, code)?;
        access
            .patient()
            .ok_or(CoreError::Access(AccessError::GrantExpired))
    }

    /// The patient record under an active grant.
    pub fn granted_patient(&self) -> Option<&HealthRecord> {
        self.doctor.as_ref().and_then(DoctorAccess::patient)
    }

    pub fn doctor_access(&self) -> Option<&DoctorAccess> {
        self.doctor.as_ref()
    }

    pub fn doctor_upsert_entry<E: RecordEntry>(&mut self, entry: E) -> Result<EntryChange, CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        Ok(access.upsert_entry(&self.conn, entry)?)
    }

    pub fn doctor_remove_entry<E: RecordEntry>(&mut self, id: &str) -> Result<E, CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        Ok(access.remove_entry(&self.conn, id)?)
    }

    pub fn revoke_access(&mut self) -> Result<(), CoreError> {
        let access = self.doctor.as_mut().ok_or(CoreError::WrongRole(Role::Doctor))?;
        Ok(access.revoke(&self.conn)?)
    }

    // ── Advisory ────────────────────────────────────────────

    /// Ask the assistant about the record in view: the granted patient
    /// for a doctor holding a grant, otherwise the signed-in record.
    /// The owner's own questions are also stored on their record.
    pub fn ask(&mut self, query: &str) -> Result<String, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EditError::Invalid {
                field: "query",
                reason: "is required".into(),
            }
            .into());
        }

        let answer = match self.granted_patient() {
            Some(patient) => self.advisory.ask(patient, query),
            None => self.advisory.ask(self.require_record()?, query),
        };

        if self.granted_patient().is_none() {
            let record = self.session.current_mut().ok_or(CoreError::NotAuthenticated)?;
            records::record_interaction(&self.conn, record, query, &answer)?;
        }
        self.push_chat(ChatRole::User, query);
        self.push_chat(ChatRole::Assistant, &answer);
        Ok(answer)
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Schemes for a free-text condition, or general ones for `None`, using
    /// the signed-in user's age.
    pub fn find_schemes(&self, condition: Option<&str>) -> Result<Vec<Scheme>, CoreError> {
        let age = self.require_record()?.profile.age;
        Ok(self.advisory.find_schemes(condition, age))
    }

    /// Match schemes to one of the owner's problems and store them on it.
    pub fn analyze_problem_schemes(&mut self, problem_id: &str) -> Result<MedicalProblem, CoreError> {
        let record = self.require_record()?;
        let analyzed = self.analyze(record, problem_id)?;
        self.session.upsert_entry(&self.conn, analyzed.clone())?;
        Ok(analyzed)
    }

    /// Same as [`CoreState::analyze_problem_schemes`] for the granted
    /// patient. Audited like any other doctor edit.
    pub fn doctor_analyze_problem_schemes(
        &mut self,
        problem_id: &str,
    ) -> Result<MedicalProblem, CoreError> {
        let patient = self
            .granted_patient()
            .ok_or(CoreError::Access(AccessError::NoActiveGrant))?;
        let analyzed = self.analyze(patient, problem_id)?;
        self.doctor_upsert_entry(analyzed.clone())?;
        Ok(analyzed)
    }

    // ── Home ────────────────────────────────────────────────

    pub fn home_data(&self) -> Result<HomeData, CoreError> {
        Ok(home::home_data(self.require_record()?, Local::now().date_naive()))
    }

    pub fn patient_home_data(&self) -> Result<HomeData, CoreError> {
        let patient = self
            .granted_patient()
            .ok_or(CoreError::Access(AccessError::NoActiveGrant))?;
        Ok(home::home_data(patient, Local::now().date_naive()))
    }

    // ── internals ───────────────────────────────────────────

    fn require_record(&self) -> Result<&HealthRecord, CoreError> {
        self.session.current().ok_or(CoreError::NotAuthenticated)
    }

    fn analyze(&self, record: &HealthRecord, problem_id: &str) -> Result<MedicalProblem, CoreError> {
        let problem: &MedicalProblem =
            records::find_entry(record, problem_id).ok_or_else(|| EditError::EntryNotFound {
                kind: MedicalProblem::KIND,
                id: problem_id.to_string(),
            })?;
        Ok(self.advisory.analyze_problem_schemes(problem, record.profile.age))
    }

    fn on_signed_in(&mut self) -> Result<(), CoreError> {
        self.doctor = match self.session.current() {
            Some(record) if record.is_doctor() => {
                Some(DoctorAccess::new(record, self.config.grant_duration)?)
            }
            _ => None,
        };
        Ok(())
    }

    /// The session now holds a new user: close what the previous one left
    /// open and reload the new record, which the revoke may have written.
    fn switch_user(&mut self) -> Result<(), CoreError> {
        self.sign_out_quietly()?;
        self.session.refresh(&self.conn)?;
        self.on_signed_in()
    }

    /// Tear down per-user state without touching the session pointer.
    fn sign_out_quietly(&mut self) -> Result<(), CoreError> {
        if let Some(mut access) = self.doctor.take() {
            access.revoke(&self.conn)?;
        }
        self.chat.clear();
        Ok(())
    }

    fn push_chat(&mut self, role: ChatRole, content: &str) {
        self.chat.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::TokenError;
    use crate::advisory::{MockLlmClient, ASK_FALLBACK};
    use crate::models::enums::{AuditAction, ProblemStatus, Severity};
    use crate::models::fixtures;
    use regex::Regex;
    use std::time::Duration;
    use tempfile::TempDir;

    const SCHEMES_JSON: &str = r#"[{"id": "pmjay", "name": "Ayushman Bharat PM-JAY",
        "benefits": "Cashless care", "coverageAmount": "5,00,000", "eligibility": "SECC families",
        "matchReason": "Covers hypertension care", "applicationSteps": ["Apply online"],
        "requiredDocuments": ["Aadhaar card"]}]"#;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            data_dir: dir.path().to_path_buf(),
            grant_duration: Duration::from_secs(1800),
            ..AppConfig::default()
        }
    }

    fn open(dir: &TempDir, client: MockLlmClient) -> CoreState<MockLlmClient> {
        CoreState::open_with_client(config(dir), client).unwrap()
    }

    fn form(name: &str, phone: &str) -> RegistrationForm {
        RegistrationForm {
            name: name.into(),
            age: 30,
            gender: "Female".into(),
            phone: phone.into(),
            national_id: "1234-5678-9012".into(),
            blood_group: "B+".into(),
            ..Default::default()
        }
    }

    /// Patient registers and records a condition, issues a token; a doctor
    /// finds her, redeems the token and edits the condition.
    #[test]
    fn patient_to_doctor_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));

        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        let id_format = Regex::new(r"^HS-[0-9A-Z]{4}-[0-9]{4}$").unwrap();
        assert!(id_format.is_match(&patient_id));

        state
            .upsert_entry(fixtures::problem("", "Hypertension", Severity::Moderate))
            .unwrap();
        let home = state.home_data().unwrap();
        assert_eq!(home.snapshot.conditions.len(), 1);
        assert_eq!(home.snapshot.conditions[0].condition, "Hypertension");
        assert_eq!(state.current_record().unwrap().problems[0].status, ProblemStatus::Present);

        let code = state.issue_access_token().unwrap();
        state.logout().unwrap();

        let doctor_id = state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap()
            .health_id()
            .to_string();
        let hits = state.search_patients("Asha").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].health_id, patient_id);

        state.select_patient(&patient_id).unwrap();
        let granted = state.verify_access_token(&code).unwrap();
        assert_eq!(granted.audit_logs.len(), 1);
        assert_eq!(granted.audit_logs[0].action, AuditAction::View);
        assert_eq!(granted.audit_logs[0].doctor_id, doctor_id);

        let mut problem = state.granted_patient().unwrap().problems[0].clone();
        problem.severity = Severity::Severe;
        state.doctor_upsert_entry(problem).unwrap();

        let stored = db::get_record(state.connection(), &patient_id).unwrap().unwrap();
        assert_eq!(stored.audit_logs.len(), 2);
        assert_eq!(stored.audit_logs[1].action, AuditAction::Update);
        assert_eq!(stored.audit_logs[1].doctor_id, doctor_id);
        assert_eq!(stored.problems[0].severity, Severity::Severe);

        // Ending the session is logged as well.
        state.revoke_access().unwrap();
        let stored = db::get_record(state.connection(), &patient_id).unwrap().unwrap();
        assert_eq!(stored.audit_logs.len(), 3);
        state.close().unwrap();
    }

    #[test]
    fn session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        state.close().unwrap();

        let reopened = open(&dir, MockLlmClient::new(""));
        assert_eq!(reopened.current_record().unwrap().health_id(), id);
    }

    #[test]
    fn logout_with_open_grant_revokes_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        let code = state.issue_access_token().unwrap();
        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        state.search_patients("rao").unwrap();
        state.select_patient(&patient_id).unwrap();
        state.verify_access_token(&code).unwrap();

        state.logout().unwrap();
        assert!(!state.is_authenticated());
        let stored = db::get_record(state.connection(), &patient_id).unwrap().unwrap();
        let actions: Vec<_> = stored.audit_logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, [AuditAction::View, AuditAction::Revoke]);
    }

    #[test]
    fn failed_sign_in_keeps_doctor_workspace_and_grant() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        let code = state.issue_access_token().unwrap();
        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        state.search_patients("rao").unwrap();
        state.select_patient(&patient_id).unwrap();
        state.verify_access_token(&code).unwrap();

        assert!(matches!(
            state.login("HS-NOPE-0000", Role::Doctor),
            Err(CoreError::Session(SessionError::UnknownIdentifier))
        ));
        assert!(matches!(
            state.login(&patient_id, Role::Doctor),
            Err(CoreError::Session(SessionError::RoleMismatch { .. }))
        ));
        assert!(state
            .register(form("", "9000000002"), Role::Doctor)
            .is_err());

        assert!(state.current_record().unwrap().is_doctor());
        assert_eq!(state.granted_patient().unwrap().health_id(), patient_id);
        assert_eq!(state.search_patients("rao").unwrap().len(), 1);
        let stored = db::get_record(state.connection(), &patient_id).unwrap().unwrap();
        assert_eq!(stored.audit_logs.len(), 1);
        assert_eq!(stored.audit_logs[0].action, AuditAction::View);
    }

    #[test]
    fn signing_in_as_granted_patient_sees_the_revoke() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        let code = state.issue_access_token().unwrap();
        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        state.search_patients("rao").unwrap();
        state.select_patient(&patient_id).unwrap();
        state.verify_access_token(&code).unwrap();

        let record = state.login(&patient_id, Role::Patient).unwrap();
        let actions: Vec<_> = record.audit_logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, [AuditAction::View, AuditAction::Revoke]);
        assert!(state.doctor_access().is_none());

        // An owner edit must not drop the REVOKE entry.
        state
            .upsert_entry(fixtures::problem("", "Asthma", Severity::Mild))
            .unwrap();
        let stored = db::get_record(state.connection(), &patient_id).unwrap().unwrap();
        assert_eq!(stored.audit_logs.len(), 2);
    }

    #[test]
    fn role_gates() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap();
        assert!(matches!(
            state.search_patients("a"),
            Err(CoreError::WrongRole(Role::Doctor))
        ));

        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        assert!(matches!(
            state.issue_access_token(),
            Err(CoreError::WrongRole(Role::Patient))
        ));
    }

    #[test]
    fn guessed_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        state.search_patients("asha").unwrap();
        state.select_patient(&patient_id).unwrap();

        // No token issued: a well-formed guess does not open the record.
        assert!(matches!(
            state.verify_access_token("1234"),
            Err(CoreError::Access(AccessError::Token(TokenError::NoTokenIssued)))
        ));
        assert!(state.granted_patient().is_none());
    }

    #[test]
    fn owner_chat_is_answered_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new("Drink water."));
        state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap();

        assert_eq!(state.ask("Any tips?").unwrap(), "Drink water.");
        assert_eq!(state.chat_history().len(), 2);
        assert_eq!(state.chat_history()[0].role, ChatRole::User);
        let record = state.current_record().unwrap();
        assert_eq!(record.interactions.len(), 1);
        assert!(record.audit_logs.is_empty());
    }

    #[test]
    fn chat_never_fails_on_transport_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::unreachable());
        state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap();
        assert_eq!(state.ask("hello").unwrap(), ASK_FALLBACK);
        assert!(state.find_schemes(None).unwrap().is_empty());
    }

    #[test]
    fn owner_scheme_analysis_is_not_audited() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockLlmClient::new("")
            .then_reply("PM-JAY covers hypertension")
            .then_reply(SCHEMES_JSON);
        let mut state = open(&dir, client);
        state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap();
        let change = state
            .upsert_entry(fixtures::problem("", "Hypertension", Severity::Moderate))
            .unwrap();

        let analyzed = state.analyze_problem_schemes(&change.id).unwrap();
        assert_eq!(analyzed.applicable_schemes.len(), 1);
        let record = state.current_record().unwrap();
        assert_eq!(record.problems[0].applicable_schemes[0].id, "pmjay");
        assert!(record.audit_logs.is_empty());
    }

    #[test]
    fn doctor_scheme_analysis_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockLlmClient::new("")
            .then_reply("PM-JAY covers hypertension")
            .then_reply(SCHEMES_JSON);
        let mut state = open(&dir, client);
        let patient_id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        let change = state
            .upsert_entry(fixtures::problem("", "Hypertension", Severity::Moderate))
            .unwrap();
        let code = state.issue_access_token().unwrap();
        state
            .register(form("Dr. Mehta", "9000000001"), Role::Doctor)
            .unwrap();
        state.search_patients(&patient_id).unwrap();
        state.select_patient(&patient_id).unwrap();
        state.verify_access_token(&code).unwrap();

        state.doctor_analyze_problem_schemes(&change.id).unwrap();
        let patient = state.granted_patient().unwrap();
        assert_eq!(patient.problems[0].applicable_schemes.len(), 1);
        let actions: Vec<_> = patient.audit_logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, [AuditAction::View, AuditAction::Update]);
        assert_eq!(state.patient_home_data().unwrap().snapshot.conditions[0].scheme_count, 1);
    }

    #[test]
    fn analysis_of_unknown_problem_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap();
        assert!(matches!(
            state.analyze_problem_schemes("PRB-404"),
            Err(CoreError::Edit(EditError::EntryNotFound { kind: "problem", .. }))
        ));
    }

    #[test]
    fn phone_login_through_core_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        let id = state
            .register(form("Asha Rao", "9876543210"), Role::Patient)
            .unwrap()
            .health_id()
            .to_string();
        state.logout().unwrap();

        let challenge = state.begin_phone_login("9876543210", Role::Patient).unwrap();
        assert_eq!(challenge.phone(), "9876543210");
        let record = state.complete_phone_login(&challenge, "0000").unwrap();
        assert_eq!(record.health_id(), id);
    }

    #[test]
    fn edits_need_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = open(&dir, MockLlmClient::new(""));
        assert!(matches!(
            state.upsert_entry(fixtures::problem("", "Asthma", Severity::Mild)),
            Err(CoreError::Session(SessionError::NotAuthenticated))
        ));
        assert!(matches!(state.home_data(), Err(CoreError::NotAuthenticated)));
        assert!(matches!(state.ask("hi"), Err(CoreError::NotAuthenticated)));
    }
}
