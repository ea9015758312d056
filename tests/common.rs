//! Shared fixtures: in-memory DOCX builders, mock collaborators, and a local
//! HTTP server standing in for remote template hosts.
#![allow(dead_code)]

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer};
use docgen_server::config::{AppConfig, FetchLimits};
use docgen_server::data::DataValue;
use docgen_server::delegates::{
    ConversionError, DocumentConverter, RenderError, TemplateRenderer,
};
use docgen_server::generation::models::{GenerateOptions, OutputFormat};
use docgen_server::storage::{StorageError, TemplateEntry, TemplateStorage};
use docgen_server::AppState;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;

/// Build a ZIP archive from `(path, contents)` pairs.
pub fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents) in parts {
        writer.start_file(*path, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal well-formed DOCX whose body contains `body_text`.
pub fn docx_with_body(body_text: &str) -> Vec<u8> {
    let document = format!(
        r#"<w:document><w:body><w:p><w:r><w:t>{body_text}</w:t></w:r></w:p></w:body></w:document>"#
    );
    zip_parts(&[
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("word/document.xml", &document),
    ])
}

pub fn docx_without_content_types() -> Vec<u8> {
    zip_parts(&[("word/document.xml", "<w:document/>")])
}

pub fn base64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

// ----------------------------------------------------------------------------
// Mock collaborators
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct MockStorage {
    files: tokio::sync::Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_template(self, org_id: &str, template_id: &str, bytes: Vec<u8>) -> Self {
        self.files
            .lock()
            .await
            .insert((org_id.to_string(), template_id.to_string()), bytes);
        self
    }

    pub async fn has_file(&self, org_id: &str, template_id: &str) -> bool {
        self.files
            .lock()
            .await
            .contains_key(&(org_id.to_string(), template_id.to_string()))
    }
}

#[async_trait::async_trait]
impl TemplateStorage for MockStorage {
    async fn get(&self, org_id: &str, template_id: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .await
            .get(&(org_id.to_string(), template_id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(template_id.to_string()))
    }

    async fn list(&self, org_id: &str) -> Result<Vec<TemplateEntry>, StorageError> {
        let files = self.files.lock().await;
        let mut entries: Vec<TemplateEntry> = files
            .keys()
            .filter(|(org, _)| org == org_id)
            .map(|(_, id)| TemplateEntry {
                id: id.clone(),
                name: id.trim_end_matches(".docx").to_string(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn put(&self, org_id: &str, template_id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.files
            .lock()
            .await
            .insert((org_id.to_string(), template_id.to_string()), data.to_vec());
        Ok(())
    }
}

pub enum RenderBehavior {
    Succeed,
    Fail(String),
    NotFound,
}

/// Records the data it was asked to render and returns `rendered-docx`.
pub struct MockRenderer {
    behavior: RenderBehavior,
    pub calls: Mutex<Vec<(Value, GenerateOptions)>>,
}

impl MockRenderer {
    pub fn new(behavior: RenderBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_data(&self) -> Option<Value> {
        self.calls.lock().unwrap().last().map(|(data, _)| data.clone())
    }
}

#[async_trait::async_trait]
impl TemplateRenderer for MockRenderer {
    async fn render(
        &self,
        _template: &[u8],
        data: &DataValue,
        options: &GenerateOptions,
    ) -> Result<Vec<u8>, RenderError> {
        self.calls
            .lock()
            .unwrap()
            .push((serde_json::to_value(data).unwrap(), options.clone()));
        match &self.behavior {
            RenderBehavior::Succeed => Ok(b"rendered-docx".to_vec()),
            RenderBehavior::Fail(message) => Err(RenderError::Failed(message.clone())),
            RenderBehavior::NotFound => Err(RenderError::TemplateNotFound("gone".to_string())),
        }
    }
}

pub struct ConversionCall {
    pub source_name: String,
    pub target: OutputFormat,
    pub metadata: Option<Map<String, Value>>,
}

pub struct MockConverter {
    alive: bool,
    pub calls: Mutex<Vec<ConversionCall>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            alive: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A converter whose service is down.
    pub fn down() -> Self {
        Self {
            alive: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DocumentConverter for MockConverter {
    async fn convert(
        &self,
        document: &[u8],
        source_name: &str,
        target: OutputFormat,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<Vec<u8>, ConversionError> {
        self.calls.lock().unwrap().push(ConversionCall {
            source_name: source_name.to_string(),
            target,
            metadata: metadata.cloned(),
        });
        if !self.alive {
            return Err(ConversionError::Unavailable("connection refused".to_string()));
        }
        let mut out = format!("converted-{}:", target.extension()).into_bytes();
        out.extend_from_slice(document);
        Ok(out)
    }

    async fn is_alive(&self) -> bool {
        self.alive
    }
}

pub struct Harness {
    pub storage: Arc<MockStorage>,
    pub renderer: Arc<MockRenderer>,
    pub converter: Arc<MockConverter>,
    pub state: web::Data<AppState>,
}

pub fn harness_with(
    storage: MockStorage,
    renderer: MockRenderer,
    converter: MockConverter,
    limits: FetchLimits,
) -> Harness {
    let storage = Arc::new(storage);
    let renderer = Arc::new(renderer);
    let converter = Arc::new(converter);
    let config = AppConfig {
        fetch: limits,
        ..AppConfig::default()
    };
    let state = AppState::new(
        config,
        reqwest::Client::new(),
        storage.clone(),
        renderer.clone(),
        converter.clone(),
    );
    Harness {
        storage,
        renderer,
        converter,
        state: web::Data::new(state),
    }
}

pub fn harness() -> Harness {
    harness_with(
        MockStorage::new(),
        MockRenderer::new(RenderBehavior::Succeed),
        MockConverter::new(),
        FetchLimits::default(),
    )
}

// ----------------------------------------------------------------------------
// Remote template host
// ----------------------------------------------------------------------------

pub const STREAMED_CHUNK: usize = 1024;
pub const STREAMED_CHUNKS: usize = 4;

async fn serve_file(name: web::Path<String>) -> HttpResponse {
    match name.as_str() {
        "valid.docx" => HttpResponse::Ok().body(docx_with_body("{{client}}")),
        "no-content-types.docx" => HttpResponse::Ok().body(docx_without_content_types()),
        "declared-large.docx" => HttpResponse::Ok().body(vec![0u8; STREAMED_CHUNK * STREAMED_CHUNKS]),
        "streamed-large.docx" => {
            let chunks = (0..STREAMED_CHUNKS)
                .map(|_| Ok::<_, std::io::Error>(web::Bytes::from(vec![0u8; STREAMED_CHUNK])));
            HttpResponse::Ok().streaming(futures_util::stream::iter(chunks))
        }
        _ => HttpResponse::NotFound().body("no such template"),
    }
}

async fn serve_slowly() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(3)).await;
    HttpResponse::Ok().body(docx_with_body("late"))
}

/// Responds with the caller's `User-Agent` as the body.
async fn echo_user_agent(req: actix_web::HttpRequest) -> HttpResponse {
    let agent = req
        .headers()
        .get(actix_web::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("<none>")
        .to_string();
    HttpResponse::Ok().body(agent)
}

async fn serve_by_query() -> HttpResponse {
    HttpResponse::Ok().body(docx_with_body("{{client}}"))
}

/// Start a template host on an ephemeral port. Returns its base URL.
pub async fn spawn_template_host() -> (String, ServerHandle) {
    let server = HttpServer::new(|| {
        App::new()
            .route("/files/{name}", web::get().to(serve_file))
            .route("/slow/template.docx", web::get().to(serve_slowly))
            .route("/download", web::get().to(serve_by_query))
            .route("/echo/user-agent.docx", web::get().to(echo_user_agent))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{addr}"), handle)
}
