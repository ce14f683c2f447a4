//! RestKit demo server.
//!
//! Serves a small in-memory notes API:
//!
//! ```text
//! GET    /notes              list notes
//! POST   /notes              create a note   {"text": "..."}
//! GET    /notes/{id}
//! DELETE /notes/{id}
//! GET    /routes             route metadata
//! ```
//!
//! Runs until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use axum::http::Method;
use clap::Parser;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use restkit::config::{load_config, ServiceConfig};
use restkit::observability::{logging, metrics};
use restkit::{
    HandlerError, ProcessContext, Request, Response, ServerMetadata, Service, ServiceError,
};

#[derive(Debug, Parser)]
#[command(name = "restkit", about = "RestKit demo notes service")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    #[serde(default)]
    id: u64,
    text: String,
}

#[derive(Default)]
struct NoteStore {
    next_id: AtomicU64,
    notes: DashMap<u64, Note>,
}

impl NoteStore {
    fn note_id(request: &Request) -> Result<u64, ServiceError> {
        request
            .param("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| ServiceError::bad_request("note id must be a number"))
    }

    fn list(&self) -> Result<Response, HandlerError> {
        let mut notes: Vec<Note> = self.notes.iter().map(|n| n.value().clone()).collect();
        notes.sort_by_key(|n| n.id);
        Ok(Response::from_serialize(&notes)?)
    }

    fn create(&self, request: &mut Request) -> Result<Response, HandlerError> {
        let mut note: Note = request.body_as()?;
        note.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let body = serde_json::to_value(&note)?;
        self.notes.insert(note.id, note);
        Ok(Response::created(body))
    }

    fn read(&self, request: &mut Request) -> Result<Response, HandlerError> {
        let id = Self::note_id(request)?;
        let note = self
            .notes
            .get(&id)
            .map(|n| n.value().clone())
            .ok_or_else(|| ServiceError::not_found(format!("note {} not found", id)))?;
        Ok(Response::from_serialize(&note)?)
    }

    fn delete(&self, request: &mut Request) -> Result<Response, HandlerError> {
        let id = Self::note_id(request)?;
        match self.notes.remove(&id) {
            Some(_) => Ok(Response::no_content()),
            None => Err(ServiceError::not_found(format!("note {} not found", id)).into()),
        }
    }
}

fn build_service(config: ServiceConfig) -> Service {
    let store = Arc::new(NoteStore::default());
    let mut service = Service::from_config(config, ProcessContext::new());

    let s = store.clone();
    service
        .uri("/notes", Arc::new(move |_: &mut Request| s.list()))
        .name("notes")
        .method(Method::GET);
    let s = store.clone();
    service
        .uri("/notes", Arc::new(move |r: &mut Request| s.create(r)))
        .method(Method::POST);

    let read = store.clone();
    let delete = store;
    service
        .uri("/notes/{id}", Arc::new(move |r: &mut Request| read.read(r)))
        .name("note")
        .method(Method::GET)
        .action(Method::DELETE, Arc::new(move |r: &mut Request| delete.delete(r)));

    // Filled once every route, this one included, is registered.
    let metadata: Arc<OnceLock<ServerMetadata>> = Arc::default();
    let routes = metadata.clone();
    service
        .uri(
            "/routes",
            Arc::new(move |_: &mut Request| -> Result<Response, HandlerError> {
                let metadata = routes
                    .get()
                    .ok_or_else(|| ServiceError::internal("route metadata not ready"))?;
                Ok(Response::from_serialize(metadata)?)
            }),
        )
        .method(Method::GET);
    let _ = metadata.set(service.route_metadata());

    service
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("logging already initialized: {}", e);
    }
    tracing::info!("restkit v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut service = build_service(config);
    let endpoint = service.bind()?;
    tracing::info!(address = %endpoint.local_addr(), "Notes service ready");

    service.await_shutdown()?;
    Ok(())
}
