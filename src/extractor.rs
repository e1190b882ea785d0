use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::GeminiConfig;

/// The three pieces of contact data pulled out of a message. The serialized
/// form always carries all three keys, null when a field was not found —
/// downstream consumers rely on the shape never changing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub success: bool,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub id_document: Option<String>,
}

impl ExtractionResult {
    pub fn failed() -> Self {
        Self {
            success: false,
            full_name: None,
            phone_number: None,
            id_document: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct ExtractionClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl ExtractionClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Ask the model for the three contact fields in the given text.
    ///
    /// Never errors: any transport failure, API error, or unparseable reply
    /// is logged and collapsed into an all-null result with success = false.
    pub async fn extract(&self, message: &str) -> ExtractionResult {
        match self.call_model(message).await {
            Ok(reply) => {
                debug!("Model reply: {}", reply);
                match parse_model_reply(&reply) {
                    Some(mut result) => {
                        result.success = true;
                        info!(
                            "Extracted fields: name={} phone={} id={}",
                            result.full_name.is_some(),
                            result.phone_number.is_some(),
                            result.id_document.is_some()
                        );
                        result
                    }
                    None => {
                        error!("Model reply was not a JSON object: {}", reply);
                        ExtractionResult::failed()
                    }
                }
            }
            Err(e) => {
                error!("Gemini call failed: {:#}", e);
                ExtractionResult::failed()
            }
        }
    }

    async fn call_model(&self, message: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(message),
                }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        debug!("Sending extraction request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_body);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .context("No candidates in Gemini response")?;

        Ok(text)
    }
}

fn build_prompt(message: &str) -> String {
    format!(
        r#"You are a data extraction specialist. Analyze the following message and extract ONLY these three pieces of information:

1. FULL NAME: Complete name of a person (first name + last name at minimum)
2. PHONE NUMBER: Any telephone number (with or without country code)
3. ID DOCUMENT: Any identification document number (cédula, DNI, passport, etc.)

STRICT RULES:
- You MUST respond ONLY with a valid JSON object
- If you cannot find any of the requested information, set that field to null
- Do not include any explanations, comments, or text outside the JSON
- Use exactly these field names: "full_name", "phone_number", "id_document"
- Values should be strings or null (not empty strings)

MESSAGE TO ANALYZE:
"{message}"

RESPOND WITH JSON ONLY:"#
    )
}

/// Parse the model's reply into an ExtractionResult (success flag unset).
///
/// Tolerant on purpose: a Markdown code fence around the JSON is stripped,
/// extra keys are ignored, and any of the three fields that is absent or not
/// a string comes back as None. Returns None only when the reply is not a
/// JSON object at all.
fn parse_model_reply(reply: &str) -> Option<ExtractionResult> {
    let cleaned = strip_code_fence(reply.trim());

    let value: serde_json::Value = serde_json::from_str(cleaned).ok()?;
    let object = value.as_object()?;

    let field = |key: &str| {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Some(ExtractionResult {
        success: false,
        full_name: field("full_name"),
        phone_number: field("phone_number"),
        id_document: field("id_document"),
    })
}

/// Strip a leading/trailing Markdown fence (``` or ```json) if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}
