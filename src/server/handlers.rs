use crate::{
    error::StudioError,
    models::{
        DeleteImageRequest, DeleteImageResponse, GalleryResponse, GenerateResponse,
    },
    server::form::read_generate_form,
    studio::Studio,
};
use actix_files::NamedFile;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use std::path::PathBuf;

pub struct StaticRoot(pub PathBuf);

pub async fn index(root: web::Data<StaticRoot>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async(root.0.join("index.html")).await?)
}

pub async fn generate(
    req: HttpRequest,
    payload: web::Payload,
    studio: web::Data<Studio>,
) -> Result<HttpResponse, StudioError> {
    let form = read_generate_form(&req, payload).await?;
    let request = form.into_request(studio.default_api_key())?;

    log::info!(
        "Generate request: {} reference(s), resolution {}, aspect ratio {}",
        request.reference_items.len(),
        request.resolution,
        request.aspect_ratio.as_deref().unwrap_or("Auto")
    );

    let outcome = studio.generate(request).await.map_err(|e| {
        log::error!("Generation failed: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(GenerateResponse::from(outcome)))
}

pub async fn gallery(studio: web::Data<Studio>) -> Result<HttpResponse, StudioError> {
    let images = studio.gallery().await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .insert_header((header::PRAGMA, "no-cache"))
        .insert_header((header::EXPIRES, "0"))
        .json(GalleryResponse { images }))
}

pub async fn delete_image(
    studio: web::Data<Studio>,
    body: web::Json<DeleteImageRequest>,
) -> Result<HttpResponse, StudioError> {
    let filename = body
        .into_inner()
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| StudioError::RequestError("Filename is required".into()))?;

    studio.delete_image(&filename).await?;
    Ok(HttpResponse::Ok().json(DeleteImageResponse { success: true }))
}
