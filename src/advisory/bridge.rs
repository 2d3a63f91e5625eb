use super::prompt::{
    build_ask_system_prompt, build_scheme_lookup_prompt, build_scheme_reshape_prompt,
    record_context, ASK_TEMPERATURE, SCHEME_LIST_SCHEMA, SCHEME_RESHAPE_SYSTEM_PROMPT,
    SCHEME_TEMPERATURE,
};
use super::schemes::parse_schemes;
use super::{AdvisoryError, GenerateRequest, LlmClient};
use crate::models::{HealthRecord, MedicalProblem, Scheme};

/// Returned by [`AdvisoryBridge::ask`] when the service cannot be reached.
pub const ASK_FALLBACK: &str =
    "I encountered an error while analyzing your health data. Please try again later.";

/// Returned by [`AdvisoryBridge::ask`] when the service replies with nothing.
pub const ASK_EMPTY_REPLY: &str = "I'm sorry, I couldn't process your request.";

/// Record + question in, text or schemes out. Failures are logged and
/// degraded, never returned.
pub struct AdvisoryBridge<C: LlmClient> {
    client: C,
    model: String,
}

impl<C: LlmClient> AdvisoryBridge<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the configured model is installed on the service.
    pub fn is_available(&self) -> bool {
        match self.client.is_model_available(&self.model) {
            Ok(available) => available,
            Err(e) => {
                tracing::warn!(error = %e, "advisory service check failed");
                false
            }
        }
    }

    /// Answer a free-text question about `record`.
    pub fn ask(&self, record: &HealthRecord, query: &str) -> String {
        match self.try_ask(record, query) {
            Ok(reply) if reply.trim().is_empty() => ASK_EMPTY_REPLY.to_string(),
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "advisory chat failed");
                ASK_FALLBACK.to_string()
            }
        }
    }

    /// Government schemes for a condition (or general ones when `None`)
    /// and an age. Empty when nothing matched or the service failed.
    pub fn find_schemes(&self, condition: Option<&str>, age: u32) -> Vec<Scheme> {
        match self.try_find_schemes(condition, age) {
            Ok(schemes) => schemes,
            Err(e) => {
                tracing::warn!(error = %e, "scheme search failed");
                Vec::new()
            }
        }
    }

    /// A copy of `problem` with freshly matched schemes attached. The caller
    /// persists it through the normal editing path.
    pub fn analyze_problem_schemes(&self, problem: &MedicalProblem, age: u32) -> MedicalProblem {
        let mut analyzed = problem.clone();
        analyzed.applicable_schemes = self.find_schemes(Some(&problem.condition), age);
        analyzed
    }

    fn try_ask(&self, record: &HealthRecord, query: &str) -> Result<String, AdvisoryError> {
        let record_json =
            record_context(record).map_err(|e| AdvisoryError::ResponseParsing(e.to_string()))?;
        let system = build_ask_system_prompt(record, &record_json);
        let request =
            GenerateRequest::new(&self.model, query, &system).temperature(ASK_TEMPERATURE);
        self.client.generate(&request)
    }

    fn try_find_schemes(
        &self,
        condition: Option<&str>,
        age: u32,
    ) -> Result<Vec<Scheme>, AdvisoryError> {
        let lookup_prompt = build_scheme_lookup_prompt(condition, age);
        let lookup = self.client.generate(
            &GenerateRequest::new(&self.model, &lookup_prompt, "").temperature(SCHEME_TEMPERATURE),
        )?;
        if lookup.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reshape_prompt = build_scheme_reshape_prompt(&lookup);
        let reshaped = self.client.generate(
            &GenerateRequest::new(&self.model, &reshape_prompt, SCHEME_RESHAPE_SYSTEM_PROMPT)
                .temperature(SCHEME_TEMPERATURE)
                .format(&SCHEME_LIST_SCHEMA),
        )?;
        parse_schemes(&reshaped)
    }
}
