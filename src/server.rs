use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::extractor::{ExtractionClient, ExtractionResult};
use crate::message::{self, WebhookPayload};
use crate::sheets::{SheetRecord, SheetsClient};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub extractor: ExtractionClient,
    pub sheets: Option<SheetsClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let extractor = ExtractionClient::new(config.gemini.clone());

        // A broken sheets setup disables the sink but not the service.
        let sheets = config.sheets.clone().and_then(|c| match SheetsClient::new(c) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Sheets sink disabled: {:#}", e);
                None
            }
        });

        Self {
            config,
            extractor,
            sheets,
        }
    }
}

/// The one wire shape every endpoint answers with. The three extraction
/// fields are always serialized, null when absent; message_content and error
/// appear only when set.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_content: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub id_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    /// Null-filled failure response with an error description.
    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            message_content: None,
            full_name: None,
            phone_number: None,
            id_document: None,
            error: Some(error.to_string()),
        }
    }

    /// Flatten an extraction result into the wire shape.
    pub fn from_extraction(message_content: Option<String>, result: ExtractionResult) -> Self {
        Self {
            success: result.success,
            message_content,
            full_name: result.full_name,
            phone_number: result.phone_number,
            id_document: result.id_document,
            error: None,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/webhook/{*subpath}", post(handle_webhook))
        .route("/test", get(handle_test))
        .route("/test-ai", post(handle_test_ai))
        .with_state(state)
}

/// POST /webhook — validate the WhatsApp payload, extract contact data,
/// optionally append to the sheet. Validation and extraction failures still
/// answer 200 with the uniform shape; only a non-JSON body is a 400.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => {
            warn!("Webhook request without a JSON payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::failure("No JSON payload received")),
            );
        }
    };

    let text = match message::validate(&payload, &state.config.whatsapp.group_jid) {
        Ok(text) => text.to_string(),
        Err(reason) => {
            info!("Message rejected: {}", reason);
            return (StatusCode::OK, Json(ApiResponse::failure(reason)));
        }
    };

    info!("Processing group message ({} chars)", text.len());
    let result = state.extractor.extract(&text).await;

    if let Some(sheets) = &state.sheets {
        let record = SheetRecord::from_result(&result);
        if let Err(e) = sheets.append(&record).await {
            // Sink failures never change the response.
            error!("Sheet append failed: {:#}", e);
        }
    }

    (
        StatusCode::OK,
        Json(ApiResponse::from_extraction(Some(text), result)),
    )
}

/// GET /test — health check.
async fn handle_test() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Service is running",
    }))
}

#[derive(Debug, Deserialize)]
struct TestAiRequest {
    #[serde(default)]
    message: Option<String>,
}

/// POST /test-ai — run the extractor on arbitrary text, skipping the
/// validator and the sheet sink.
async fn handle_test_ai(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    let request: TestAiRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::failure("No JSON payload received")),
            );
        }
    };

    let text = match request.message.as_deref() {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::failure("Field 'message' must be a non-empty string")),
            );
        }
    };

    let result = state.extractor.extract(&text).await;
    (
        StatusCode::OK,
        Json(ApiResponse::from_extraction(Some(text), result)),
    )
}
