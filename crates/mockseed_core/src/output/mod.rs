//! Document rendering and persistence.
//!
//! # Responsibility
//! - Turn a generated state into the service document: users and catalogs
//!   keyed by identifier.
//! - Write the document so a failed write never leaves a partial file.
//!
//! # Invariants
//! - Object keys are emitted in sorted order; equal states give equal bytes.
//! - The destination is replaced by rename only after the full document
//!   has been written and flushed.

use crate::backends::Backend;
use crate::model::graph::GeneratedState;
use log::info;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output write failures.
#[derive(Debug)]
pub enum OutputError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
}

impl Display for OutputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot write {}: {source}", path.display()),
            Self::Json(err) => write!(f, "document encoding failed: {err}"),
        }
    }
}

impl Error for OutputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
        }
    }
}

/// File name for a service document: `diverse_<service>_state.json`.
pub fn output_file_name(service: &str) -> String {
    format!("diverse_{service}_state.json")
}

/// Renders `state` with `backend`'s renderer.
pub fn render_document(backend: &dyn Backend, state: &GeneratedState) -> Value {
    let mut users = Map::new();
    for owner in &state.owners {
        users.insert(owner.id.to_string(), backend.render_owner(owner));
    }

    let mut document = Map::new();
    document.insert("users".to_string(), Value::Object(users));
    for (name, entries) in &state.catalogs {
        let mut catalog = Map::new();
        for entry in entries {
            catalog.insert(entry.id.to_string(), backend.render_catalog_entry(entry));
        }
        document.insert(name.clone(), Value::Object(catalog));
    }
    Value::Object(document)
}

/// Writes `document` as pretty JSON to `path`, replacing it atomically.
///
/// # Errors
/// - `Io` when the sibling temporary file cannot be written or renamed.
/// - `Json` when encoding fails.
pub fn write_document(path: &Path, document: &Value) -> Result<(), OutputError> {
    let staging = staging_path(path);
    if let Err(err) = write_staged(&staging, document) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    if let Err(source) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(OutputError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    info!(
        "event=document_written module=output path={}",
        path.display()
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn write_staged(staging: &Path, document: &Value) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: staging.to_path_buf(),
        source,
    };
    let file = File::create(staging).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document).map_err(OutputError::Json)?;
    writer.write_all(b"\n").map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    writer.get_ref().sync_all().map_err(io_error)?;
    Ok(())
}
