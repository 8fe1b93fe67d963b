use crate::fs_ops::directory_size;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

const COPY_CHUNK: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Move,
}

pub struct TransferRequest {
    pub request_id: u64,
    pub kind: TransferKind,
    pub source: PathBuf,
    /// Full destination path; the caller resolves name clashes first.
    pub dest: PathBuf,
    pub cancel: Arc<AtomicBool>,
}

pub enum TransferResponse {
    Progress {
        request_id: u64,
        bytes_done: u64,
        bytes_total: u64,
    },
    Finished {
        request_id: u64,
        kind: TransferKind,
        dest: PathBuf,
    },
    Cancelled {
        request_id: u64,
    },
    Failed {
        request_id: u64,
        error: String,
    },
}

enum Outcome {
    Completed,
    Cancelled,
}

/// Dedicated worker thread for copy and move. Transfers run FIFO off the UI
/// thread; progress is reported in bytes against a precomputed total, and
/// the shared cancel flag stops a transfer mid-file. A cancelled transfer
/// removes its partial destination and leaves the source untouched.
pub fn spawn_transfer_worker() -> (Sender<TransferRequest>, Receiver<TransferResponse>) {
    let (tx_req, rx_req) = mpsc::channel::<TransferRequest>();
    let (tx_res, rx_res) = mpsc::channel::<TransferResponse>();

    thread::spawn(move || {
        while let Ok(req) = rx_req.recv() {
            if run_transfer(&tx_res, req).is_err() {
                break;
            }
        }
    });

    (tx_req, rx_res)
}

// Err means the response receiver is gone and the worker should exit.
fn run_transfer(
    tx_res: &Sender<TransferResponse>,
    req: TransferRequest,
) -> std::result::Result<(), ()> {
    let bytes_total = if req.source.is_dir() {
        directory_size(&req.source)
    } else {
        fs::metadata(&req.source).map(|m| m.len()).unwrap_or(0)
    };

    let mut bytes_done = 0u64;
    let mut report = |chunk: u64| -> bool {
        bytes_done += chunk;
        tx_res
            .send(TransferResponse::Progress {
                request_id: req.request_id,
                bytes_done,
                bytes_total,
            })
            .is_ok()
    };

    let result = copy_recursive(&req.source, &req.dest, &req.cancel, &mut report);
    let msg = match result {
        Ok(Outcome::Completed) => {
            if req.kind == TransferKind::Move {
                if let Err(err) = remove_source(&req.source) {
                    warn!(source = %req.source.display(), %err, "move: source removal failed");
                    TransferResponse::Failed {
                        request_id: req.request_id,
                        error: format!("copied, but removing the source failed: {err:#}"),
                    }
                } else {
                    finished(&req)
                }
            } else {
                finished(&req)
            }
        }
        Ok(Outcome::Cancelled) => {
            cleanup_partial(&req.dest);
            info!(source = %req.source.display(), "transfer cancelled");
            TransferResponse::Cancelled {
                request_id: req.request_id,
            }
        }
        Err(err) => {
            cleanup_partial(&req.dest);
            warn!(source = %req.source.display(), %err, "transfer failed");
            TransferResponse::Failed {
                request_id: req.request_id,
                error: format!("{err:#}"),
            }
        }
    };

    tx_res.send(msg).map_err(|_| ())
}

fn finished(req: &TransferRequest) -> TransferResponse {
    info!(
        source = %req.source.display(),
        dest = %req.dest.display(),
        "transfer finished"
    );
    TransferResponse::Finished {
        request_id: req.request_id,
        kind: req.kind,
        dest: req.dest.clone(),
    }
}

fn remove_source(source: &Path) -> Result<()> {
    if source.is_dir() {
        fs::remove_dir_all(source)
            .with_context(|| format!("failed to remove {}", source.display()))
    } else {
        fs::remove_file(source)
            .with_context(|| format!("failed to remove {}", source.display()))
    }
}

fn cleanup_partial(dest: &Path) {
    if dest.is_dir() {
        let _ = fs::remove_dir_all(dest);
    } else if dest.exists() {
        let _ = fs::remove_file(dest);
    }
}

fn copy_recursive(
    source: &Path,
    dest: &Path,
    cancel: &AtomicBool,
    report: &mut dyn FnMut(u64) -> bool,
) -> Result<Outcome> {
    if cancel.load(Ordering::Relaxed) {
        return Ok(Outcome::Cancelled);
    }
    if !source.is_dir() {
        return copy_file_chunked(source, dest, cancel, report);
    }

    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;
    let iter = fs::read_dir(source)
        .with_context(|| format!("failed to list {}", source.display()))?;
    for entry in iter {
        let entry =
            entry.with_context(|| format!("failed to list {}", source.display()))?;
        let child_dest = dest.join(entry.file_name());
        match copy_recursive(&entry.path(), &child_dest, cancel, report)? {
            Outcome::Completed => {}
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        }
    }
    Ok(Outcome::Completed)
}

fn copy_file_chunked(
    source: &Path,
    dest: &Path,
    cancel: &AtomicBool,
    report: &mut dyn FnMut(u64) -> bool,
) -> Result<Outcome> {
    let mut src = File::open(source)
        .with_context(|| format!("failed to open {}", source.display()))?;
    let mut dst = File::create(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;
    let mut buf = vec![0u8; COPY_CHUNK];

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(Outcome::Cancelled);
        }
        let n = src
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", source.display()))?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])
            .with_context(|| format!("failed to write {}", dest.display()))?;
        if !report(n as u64) {
            // UI side went away; treat like a cancel.
            return Ok(Outcome::Cancelled);
        }
    }

    if let Ok(metadata) = fs::metadata(source) {
        let _ = fs::set_permissions(dest, metadata.permissions());
    }
    Ok(Outcome::Completed)
}
