// web-server/src/static_files.rs
use actix_web::{web, HttpRequest, HttpResponse, Result, Error};
use actix_files::{Files, NamedFile};
use std::path::PathBuf;

// Configuration for serving the page shell
#[derive(Clone)]
pub struct StaticFilesConfig {
    pub root_path: PathBuf,
    pub index_file: String,
}

impl From<&common::StaticFilesConfig> for StaticFilesConfig {
    fn from(config: &common::StaticFilesConfig) -> Self {
        Self {
            root_path: PathBuf::from(&config.path),
            index_file: config.index.clone(),
        }
    }
}

// Unknown non-API routes get the page shell
async fn spa_index(req: HttpRequest, config: web::Data<StaticFilesConfig>) -> Result<HttpResponse, Error> {
    if req.path().starts_with("/api/") {
        return Ok(HttpResponse::NotFound().finish());
    }

    let index_path = config.root_path.join(&config.index_file);
    let file = NamedFile::open(index_path)?;
    Ok(file.into_response(&req))
}

// Configure static file serving with SPA support
pub fn configure(cfg: &mut web::ServiceConfig, config: StaticFilesConfig) {
    tracing::info!("Serving page shell from {}", config.root_path.display());

    cfg.app_data(web::Data::new(config.clone()))
        .service(
            Files::new("/", &config.root_path)
                .index_file(&config.index_file)
                .prefer_utf8(true)
                .use_etag(true)
                .use_last_modified(true)
                .default_handler(web::route().to(spa_index))
        );
}
