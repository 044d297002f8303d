//! Turns `/generate` bodies (JSON or multipart) into a [`GenerateForm`].

use crate::{
    error::{Result, StudioError},
    models::UploadedFile,
    studio::{assemble_reference_items, GenerateForm},
};
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

pub const MAX_JSON_BODY: usize = 2 * 1024 * 1024;
/// Per-part cap for multipart text fields.
pub const MAX_TEXT_FIELD: usize = MAX_JSON_BODY;
/// Per-file cap for `reference_images` parts.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
/// Cap for all multipart parts combined.
pub const MAX_MULTIPART_BODY: usize = 64 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
struct JsonGenerateBody {
    prompt: Option<String>,
    aspect_ratio: Option<String>,
    resolution: Option<String>,
    api_key: Option<String>,
    #[serde(default)]
    reference_image_paths: Vec<Option<String>>,
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.to_ascii_lowercase().contains("multipart/form-data"))
}

/// `reference_image_paths` is a JSON array of strings and nulls. Anything
/// unparseable counts as "no declaration".
pub fn parse_declared_paths(raw: &str) -> Vec<Option<String>> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Option<String>>>(raw) {
        Ok(paths) => paths,
        Err(e) => {
            log::warn!("Ignoring malformed reference_image_paths: {}", e);
            Vec::new()
        }
    }
}

pub async fn read_generate_form(req: &HttpRequest, payload: web::Payload) -> Result<GenerateForm> {
    if is_multipart(req) {
        read_multipart(req, payload).await
    } else {
        read_json(payload).await
    }
}

async fn read_json(mut payload: web::Payload) -> Result<GenerateForm> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| StudioError::RequestError(e.to_string()))?;
        if body.len() + chunk.len() > MAX_JSON_BODY {
            return Err(StudioError::RequestError("JSON body too large".into()));
        }
        body.extend_from_slice(&chunk);
    }

    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        JsonGenerateBody::default()
    } else {
        serde_json::from_slice::<JsonGenerateBody>(&body)
            .map_err(|e| StudioError::RequestError(e.to_string()))?
    };

    let mut form = GenerateForm {
        prompt: parsed.prompt,
        aspect_ratio: parsed.aspect_ratio,
        resolution: parsed.resolution,
        api_key: parsed.api_key,
        ..Default::default()
    };
    form.set_references(assemble_reference_items(
        parsed.reference_image_paths,
        Vec::new(),
    ));
    Ok(form)
}

async fn read_multipart(req: &HttpRequest, payload: web::Payload) -> Result<GenerateForm> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut form = GenerateForm::default();
    let mut declared = Vec::new();
    let mut uploads = Vec::new();
    let mut total = 0usize;

    while let Some(mut field) = multipart
        .try_next()
        .await
        .map_err(|e| StudioError::RequestError(e.to_string()))?
    {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);

        let limit = if name == "reference_images" {
            MAX_UPLOAD_BYTES
        } else {
            MAX_TEXT_FIELD
        };
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| StudioError::RequestError(e.to_string()))?
        {
            total += chunk.len();
            if total > MAX_MULTIPART_BODY {
                return Err(StudioError::RequestError("Multipart body too large".into()));
            }
            if bytes.len() + chunk.len() > limit {
                return Err(StudioError::RequestError(format!(
                    "Form field {} exceeds {} bytes",
                    name, limit
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "reference_images" => {
                let original_filename = filename.unwrap_or_default();
                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() && original_filename.is_empty() {
                    continue;
                }
                uploads.push(UploadedFile::new(bytes, original_filename));
            }
            "reference_image_paths" => {
                declared = parse_declared_paths(&String::from_utf8_lossy(&bytes));
            }
            "prompt" => form.prompt = Some(String::from_utf8_lossy(&bytes).into_owned()),
            "aspect_ratio" => {
                form.aspect_ratio = Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            "resolution" => form.resolution = Some(String::from_utf8_lossy(&bytes).into_owned()),
            "api_key" => form.api_key = Some(String::from_utf8_lossy(&bytes).into_owned()),
            other => log::debug!("Ignoring form field {}", other),
        }
    }

    log::debug!(
        "Multipart form: {} upload(s), {} declared reference(s)",
        uploads.len(),
        declared.len()
    );
    form.set_references(assemble_reference_items(declared, uploads));
    Ok(form)
}
