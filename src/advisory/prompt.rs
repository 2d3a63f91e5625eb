use std::sync::LazyLock;

use crate::config::ASSISTANT_NAME;
use crate::models::HealthRecord;

/// Disclaimer the assistant must open every answer with.
pub const DISCLAIMER: &str = "I am August AI, a guidance assistant. I am not a substitute for professional medical advice, diagnosis, or treatment. Always seek the advice of your physician.";

/// Temperature for open-ended chat.
pub const ASK_TEMPERATURE: f32 = 0.6;

/// Temperature for the scheme lookup and reshaping calls.
pub const SCHEME_TEMPERATURE: f32 = 0.2;

/// Mask a national identity number down to its last four characters.
/// Separators are kept so the shape stays recognizable.
pub fn mask_national_id(raw: &str) -> String {
    let raw = raw.trim();
    let significant = raw.chars().filter(|c| c.is_alphanumeric()).count();
    let keep_from = significant.saturating_sub(4);
    let short = significant <= 4;

    let mut seen = 0;
    raw.chars()
        .map(|c| {
            if !c.is_alphanumeric() {
                return c;
            }
            seen += 1;
            if short || seen <= keep_from {
                'X'
            } else {
                c
            }
        })
        .collect()
}

/// The record as JSON with the national ID masked. Audit entries and past
/// chat are left out; they carry nothing the assistant needs.
pub fn record_context(record: &HealthRecord) -> Result<String, serde_json::Error> {
    let mut context = record.clone();
    context.profile.national_id = mask_national_id(&context.profile.national_id);
    context.profile.profile_picture = None;
    context.audit_logs.clear();
    context.interactions.clear();
    serde_json::to_string(&context)
}

/// System instruction for a chat question about `record`.
pub fn build_ask_system_prompt(record: &HealthRecord, record_json: &str) -> String {
    let profile = &record.profile;
    let emergency = match &profile.emergency_contact {
        Some(contact) => format!("an emergency contact is on file ({})", contact.name),
        None => "no emergency contact is on file; suggest adding one".to_string(),
    };

    format!(
        r#"You are {ASSISTANT_NAME}, a professional medical records assistant.
Analyze the provided health history for this user: {record_json}

Guidelines:
1. Always include this disclaimer: "{DISCLAIMER}"
2. Deeply analyze the user's blood group ({blood}), allergies and current medications.
3. Look for potential drug-drug interactions or conflicts between their conditions and medications.
4. Give specific lifestyle advice (diet, exercise, sleep) tailored to their age ({age}) and blood group.
5. Mention emergency readiness: {emergency}.
6. Be professional and empathetic. Never repeat identity numbers; they are masked.

Context:
Name: {name}
Health ID: {health_id}"#,
        blood = profile.blood_group,
        age = profile.age,
        name = profile.name,
        health_id = profile.health_id,
    )
}

/// First scheme call: free-text lookup.
pub fn build_scheme_lookup_prompt(condition: Option<&str>, age: u32) -> String {
    let focus = match condition.map(str::trim).filter(|c| !c.is_empty()) {
        Some(condition) => format!("a {age}-year-old patient diagnosed with {condition}"),
        None => format!("a {age}-year-old citizen, covering general health and insurance needs"),
    };
    format!(
        "List the government health and welfare schemes in India that apply to {focus}. \
         For each scheme give its name, the benefits, the coverage amount, who is eligible, \
         why it matches this person, the steps to apply, the documents required and the \
         official website if known. Only include schemes that currently exist."
    )
}

pub const SCHEME_RESHAPE_SYSTEM_PROMPT: &str = "You convert free-text descriptions of government schemes into JSON. Output only JSON that follows the given schema. Do not invent schemes that are not in the text.";

/// Second scheme call: reshape the lookup answer into data.
pub fn build_scheme_reshape_prompt(lookup_answer: &str) -> String {
    format!(
        "Convert the schemes described below into a JSON array. Each item needs: id (short \
         kebab-case slug), name, benefits, coverageAmount, eligibility, matchReason, \
         applicationSteps (array of strings), requiredDocuments (array of strings) and, when \
         known, officialLink.\n\n<SCHEMES>\n{lookup_answer}\n</SCHEMES>"
    )
}

/// JSON schema passed as the response-shape hint for reshaping.
pub static SCHEME_LIST_SCHEMA: LazyLock<serde_json::Value> = LazyLock::new(|| {
    let text = serde_json::json!({ "type": "string" });
    let list = serde_json::json!({ "type": "array", "items": { "type": "string" } });
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": text,
                "name": text,
                "benefits": text,
                "coverageAmount": text,
                "eligibility": text,
                "matchReason": text,
                "applicationSteps": list,
                "requiredDocuments": list,
                "officialLink": text,
            },
            "required": [
                "id", "name", "benefits", "coverageAmount", "eligibility",
                "matchReason", "applicationSteps", "requiredDocuments"
            ]
        }
    })
});
