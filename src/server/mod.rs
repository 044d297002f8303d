pub mod form;
pub mod handlers;

use crate::{
    config::Config,
    error::StudioError,
    storage::{GENERATED_URL_PREFIX, UPLOADS_URL_PREFIX},
    studio::Studio,
};
use actix_files::Files;
use actix_web::{
    http::StatusCode, middleware, web, App, HttpResponse, HttpServer, ResponseError,
};
use handlers::StaticRoot;
use serde_json::json;
use std::path::PathBuf;

impl ResponseError for StudioError {
    fn status_code(&self) -> StatusCode {
        match self {
            StudioError::MissingPrompt
            | StudioError::RequestError(_)
            | StudioError::InvalidFilename => StatusCode::BAD_REQUEST,
            StudioError::MissingApiKey => StatusCode::UNAUTHORIZED,
            StudioError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Directories the routes serve files from.
#[derive(Debug, Clone)]
pub struct ServedDirs {
    pub static_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub uploads_dir: PathBuf,
}

impl ServedDirs {
    pub fn from_config(config: &Config) -> Self {
        Self {
            static_dir: config.storage.static_dir.clone(),
            generated_dir: config.storage.generated_dir.clone(),
            uploads_dir: config.storage.uploads_dir.clone(),
        }
    }
}

/// Registers every route. Shared by [`run`] and the HTTP tests.
pub fn configure(studio: Studio, dirs: ServedDirs) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(studio))
            .app_data(web::Data::new(StaticRoot(dirs.static_dir.clone())))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                StudioError::RequestError(err.to_string()).into()
            }))
            .route("/", web::get().to(handlers::index))
            .route("/generate", web::post().to(handlers::generate))
            .route("/gallery", web::get().to(handlers::gallery))
            .route("/delete_image", web::post().to(handlers::delete_image))
            .service(Files::new(GENERATED_URL_PREFIX, dirs.generated_dir))
            .service(Files::new(UPLOADS_URL_PREFIX, dirs.uploads_dir))
            .service(Files::new("/static", dirs.static_dir));
    }
}

pub async fn run(config: Config, studio: Studio) -> std::io::Result<()> {
    let host = config.host.clone();
    let port = config.port();
    let dirs = ServedDirs::from_config(&config);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::new("%r %s %b %Dms"))
            .configure(configure(studio.clone(), dirs.clone()))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
