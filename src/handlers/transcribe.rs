//! Upload endpoint: `POST /transcrever` (also accepted at `POST /`).
//!
//! ## Request:
//! Multipart form data with an audio file field named "audio".
//!
//! ## Response:
//! ```json
//! {
//!   "transcricao": "Bom dia a todos. ...",
//!   "diarizacao": [{"speaker": "A", "start": 0, "end": 1800, "text": "Bom dia a todos."}],
//!   "resumo": "A equipe alinhou ...",
//!   "insights": ["...", "..."]
//! }
//! ```

use crate::error::AppError;
use crate::pipeline;
use crate::state::AppState;
use crate::storage::UploadedAudio;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::stream::StreamExt;

/// Name of the multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

pub async fn transcrever(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    // A body that is not multipart cannot carry the field at all.
    if !is_multipart(&req) {
        return Err(AppError::missing_audio());
    }

    let max_bytes = state.get_config().server.max_upload_bytes;
    let upload = read_audio_field(payload, max_bytes)
        .await?
        .ok_or_else(AppError::missing_audio)?;

    if upload.bytes.is_empty() {
        return Err(AppError::Validation("arquivo de áudio vazio".to_string()));
    }

    tracing::info!(
        size_bytes = upload.bytes.len(),
        content_type = upload.content_type.as_deref().unwrap_or("unknown"),
        filename = upload.filename.as_deref().unwrap_or("unknown"),
        "audio received"
    );

    let response = pipeline::run(&state, upload).await?;
    Ok(HttpResponse::Ok().json(response))
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().to_ascii_lowercase().starts_with("multipart/"))
        .unwrap_or(false)
}

/// Pull the `audio` field out of a multipart body.
///
/// Returns `Ok(None)` when the body has no such field. Other fields are skipped.
async fn read_audio_field(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedAudio>, AppError> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::Validation(format!("corpo multipart inválido: {}", e)))?;

        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(|mime| mime.to_string());
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| AppError::Validation(format!("falha ao ler o campo 'audio': {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::Validation(format!(
                    "arquivo de áudio excede o limite de {} bytes",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Some(UploadedAudio {
            bytes,
            content_type,
            filename,
        }));
    }

    Ok(None)
}
