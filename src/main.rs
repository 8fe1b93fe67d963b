#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fileguard::app::FileGuardApp;
use fileguard::auth::CredentialStore;

#[derive(Parser, Debug)]
#[command(name = "fileguard")]
#[command(about = "Desktop file browser gated by a local login screen")]
struct Args {
    /// Credential store file (defaults to users.json next to the executable)
    #[arg(long)]
    users_file: Option<PathBuf>,
    /// Directory to open after login instead of the Computer view
    #[arg(long)]
    start_dir: Option<PathBuf>,
}

fn default_users_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("users.json")))
        .unwrap_or_else(|| PathBuf::from("users.json"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let users_file = args.users_file.unwrap_or_else(default_users_file);
    // A corrupt store is fatal here on purpose: resetting it silently would
    // throw away every registered account.
    let store = CredentialStore::load(&users_file)
        .with_context(|| format!("cannot start: credential store {}", users_file.display()))?;

    let start_dir = args.start_dir.map(|dir| dir.canonicalize().unwrap_or(dir));

    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport =
        eframe::egui::ViewportBuilder::default().with_inner_size(eframe::egui::vec2(1000.0, 640.0));

    eframe::run_native(
        "File Manager",
        native_options,
        Box::new(move |_cc| Ok(Box::new(FileGuardApp::new(store, start_dir)))),
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}
