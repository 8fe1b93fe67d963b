use crate::auth::CredentialStore;
use crate::fs_ops::{self, EntryInfo};
use crate::history::{Location, NavHistory};
use crate::transfer::{
    spawn_transfer_worker, TransferKind, TransferRequest, TransferResponse,
};
use chrono::{DateTime, Local};
use eframe::egui;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::error;

const MIN_PASSWORD_CHARS: usize = 6;

enum Screen {
    Login,
    Browser,
}

#[derive(Default)]
struct LoginForm {
    username: String,
    password: String,
    notice: String,
}

#[derive(Clone)]
struct ClipboardItem {
    path: PathBuf,
    kind: TransferKind,
}

struct ActiveTransfer {
    request_id: u64,
    cancel: Arc<AtomicBool>,
    bytes_done: u64,
    bytes_total: u64,
    label: String,
}

struct PropertiesView {
    open: bool,
    path: PathBuf,
    name: String,
    location: String,
    type_label: String,
    size_text: String,
    created: String,
    modified: String,
    accessed: String,
    readonly: bool,
}

struct PreviewView {
    open: bool,
    title: String,
    text: String,
}

enum PendingDialog {
    NewFolder { name: String },
    NewFile { name: String },
    Rename { target: PathBuf, name: String },
    ConfirmDelete { target: PathBuf },
}

#[derive(Clone, Copy)]
enum RowAction {
    Open,
    Copy,
    Cut,
    Paste,
    Rename,
    Delete,
    Preview,
    Properties,
}

pub struct FileGuardApp {
    store: CredentialStore,
    screen: Screen,
    login: LoginForm,
    start_dir: Option<PathBuf>,

    history: NavHistory,
    entries: Vec<EntryInfo>,
    selected: Option<usize>,
    filter: String,
    shortcuts: Vec<(String, PathBuf)>,

    clipboard: Option<ClipboardItem>,
    transfer_tx: Sender<TransferRequest>,
    transfer_rx: Receiver<TransferResponse>,
    next_transfer_id: u64,
    active_transfer: Option<ActiveTransfer>,

    properties: Option<PropertiesView>,
    preview: Option<PreviewView>,
    dialog: Option<PendingDialog>,

    notice: String,
    status_line: String,
}

impl FileGuardApp {
    pub fn new(store: CredentialStore, start_dir: Option<PathBuf>) -> Self {
        let (transfer_tx, transfer_rx) = spawn_transfer_worker();
        Self {
            store,
            screen: Screen::Login,
            login: LoginForm::default(),
            start_dir,
            history: NavHistory::new(),
            entries: Vec::new(),
            selected: None,
            filter: String::new(),
            shortcuts: build_shortcuts(),
            clipboard: None,
            transfer_tx,
            transfer_rx,
            next_transfer_id: 1,
            active_transfer: None,
            properties: None,
            preview: None,
            dialog: None,
            notice: String::new(),
            status_line: String::new(),
        }
    }

    // --- login ---

    fn try_login(&mut self) {
        let username = self.login.username.trim().to_string();
        if username.is_empty() || self.login.password.is_empty() {
            self.login.notice = "Enter both username and password".to_string();
            return;
        }
        if self.store.verify(&username, &self.login.password) {
            self.login.password.clear();
            self.login.notice.clear();
            self.enter_browser();
        } else {
            // Unknown user and wrong password read the same on purpose.
            self.login.notice = "Invalid username or password".to_string();
            self.login.password.clear();
        }
    }

    fn try_register(&mut self) {
        let username = self.login.username.trim().to_string();
        if username.is_empty() || self.login.password.is_empty() {
            self.login.notice = "Enter both username and password".to_string();
            return;
        }
        if self.login.password.chars().count() < MIN_PASSWORD_CHARS {
            self.login.notice =
                format!("Password must be at least {MIN_PASSWORD_CHARS} characters");
            return;
        }
        match self.store.register(&username, &self.login.password) {
            Ok(true) => {
                self.login.notice =
                    "Registration successful, log in with your new account".to_string();
                self.login.username.clear();
                self.login.password.clear();
            }
            Ok(false) => {
                self.login.notice = "Username already exists".to_string();
            }
            Err(err) => {
                error!(%err, "saving credential store failed");
                self.login.notice = format!("Could not save account: {err:#}");
            }
        }
    }

    fn enter_browser(&mut self) {
        self.screen = Screen::Browser;
        self.navigate(Location::Roots);
        if let Some(dir) = self.start_dir.take() {
            if dir.is_dir() {
                self.navigate(Location::Dir(dir));
            }
        }
    }

    // --- navigation ---

    /// Validate the target by listing it first; only a listable location is
    /// recorded in the history.
    fn navigate(&mut self, location: Location) {
        match load_entries(&location) {
            Ok(entries) => {
                self.history.visit(location);
                self.apply_entries(entries);
                self.clear_notice();
            }
            Err(err) => self.set_notice(format!("Cannot open: {err:#}")),
        }
    }

    fn go_back(&mut self) {
        if let Some(location) = self.history.back().cloned() {
            self.show_location(&location);
        }
    }

    fn go_forward(&mut self) {
        if let Some(location) = self.history.forward().cloned() {
            self.show_location(&location);
        }
    }

    fn go_up(&mut self) {
        match self.history.current() {
            Location::Roots => {}
            Location::Dir(path) => match path.parent() {
                Some(parent) if parent.as_os_str().is_empty() => self.navigate(Location::Roots),
                Some(parent) => self.navigate(Location::dir(parent)),
                None => self.navigate(Location::Roots),
            },
        }
    }

    fn refresh(&mut self) {
        let location = self.history.current();
        self.show_location(&location);
    }

    /// Reload the listing for a location the history already points at
    /// (back/forward/refresh): the cursor must not move again.
    fn show_location(&mut self, location: &Location) {
        match load_entries(location) {
            Ok(entries) => {
                self.apply_entries(entries);
                self.clear_notice();
            }
            Err(err) => {
                self.entries.clear();
                self.selected = None;
                self.set_notice(format!("Cannot list: {err:#}"));
            }
        }
    }

    fn apply_entries(&mut self, entries: Vec<EntryInfo>) {
        self.entries = entries;
        self.selected = None;
        self.filter.clear();
        self.refresh_status_line();
    }

    fn current_dir(&self) -> Option<PathBuf> {
        self.history.current().as_dir().map(Path::to_path_buf)
    }

    fn selected_entry(&self) -> Option<&EntryInfo> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    /// Indices into `entries` that pass the name filter.
    fn visible_rows(&self) -> Vec<usize> {
        if self.filter.trim().is_empty() {
            return (0..self.entries.len()).collect();
        }
        let needle = self.filter.to_lowercase();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }

    fn open_row(&mut self, index: usize) {
        let Some(entry) = self.entries.get(index) else {
            return;
        };
        if entry.is_dir {
            self.navigate(Location::dir(entry.path.clone()));
        } else if let Err(err) = fs_ops::open_with_default(&entry.path) {
            self.set_notice(format!("{err:#}"));
        }
    }

    // --- file actions ---

    fn copy_selected(&mut self, kind: TransferKind) {
        let Some(entry) = self.selected_entry() else {
            self.set_notice("Nothing selected");
            return;
        };
        let verb = match kind {
            TransferKind::Copy => "Copied",
            TransferKind::Move => "Cut",
        };
        let name = entry.name.clone();
        self.clipboard = Some(ClipboardItem {
            path: entry.path.clone(),
            kind,
        });
        self.set_notice(format!("{verb}: {name}"));
    }

    fn paste_clipboard(&mut self) {
        if self.active_transfer.is_some() {
            self.set_notice("A transfer is already running");
            return;
        }
        let Some(item) = self.clipboard.clone() else {
            self.set_notice("Clipboard is empty");
            return;
        };
        let Some(dir) = self.current_dir() else {
            self.set_notice("Cannot paste into the Computer view");
            return;
        };
        if !item.path.exists() {
            self.set_notice("Clipboard source no longer exists");
            self.clipboard = None;
            return;
        }
        let Some(file_name) = item
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
        else {
            self.set_notice("Clipboard source has no name");
            return;
        };
        if item.path.is_dir() && dir.starts_with(&item.path) {
            self.set_notice("Cannot paste a folder into itself");
            return;
        }

        let dest = fs_ops::unique_destination(&dir, &file_name);
        let request_id = self.next_transfer_id;
        self.next_transfer_id += 1;
        let cancel = Arc::new(AtomicBool::new(false));
        let request = TransferRequest {
            request_id,
            kind: item.kind,
            source: item.path.clone(),
            dest,
            cancel: Arc::clone(&cancel),
        };
        if self.transfer_tx.send(request).is_err() {
            self.set_notice("Transfer worker is unavailable");
            return;
        }
        self.active_transfer = Some(ActiveTransfer {
            request_id,
            cancel,
            bytes_done: 0,
            bytes_total: 0,
            label: file_name,
        });
        if item.kind == TransferKind::Move {
            self.clipboard = None;
        }
        self.refresh_status_line();
    }

    fn poll_transfer_responses(&mut self) {
        while let Ok(response) = self.transfer_rx.try_recv() {
            let active_id = self.active_transfer.as_ref().map(|t| t.request_id);
            match response {
                TransferResponse::Progress {
                    request_id,
                    bytes_done,
                    bytes_total,
                } => {
                    if Some(request_id) == active_id {
                        if let Some(transfer) = self.active_transfer.as_mut() {
                            transfer.bytes_done = bytes_done;
                            transfer.bytes_total = bytes_total;
                        }
                    }
                }
                TransferResponse::Finished { request_id, .. } => {
                    if Some(request_id) == active_id {
                        self.active_transfer = None;
                        self.set_notice("Transfer finished");
                        self.refresh();
                    }
                }
                TransferResponse::Cancelled { request_id } => {
                    if Some(request_id) == active_id {
                        self.active_transfer = None;
                        self.set_notice("Transfer cancelled");
                        self.refresh();
                    }
                }
                TransferResponse::Failed { request_id, error } => {
                    if Some(request_id) == active_id {
                        self.active_transfer = None;
                        self.set_notice(format!("Transfer failed: {error}"));
                        self.refresh();
                    }
                }
            }
        }
    }

    fn confirm_delete_selected(&mut self) {
        match self.selected_entry() {
            Some(entry) => {
                self.dialog = Some(PendingDialog::ConfirmDelete {
                    target: entry.path.clone(),
                })
            }
            None => self.set_notice("Nothing selected"),
        }
    }

    fn open_rename_dialog(&mut self) {
        match self.selected_entry() {
            Some(entry) => {
                self.dialog = Some(PendingDialog::Rename {
                    target: entry.path.clone(),
                    name: entry.name.clone(),
                })
            }
            None => self.set_notice("Nothing selected"),
        }
    }

    fn open_preview(&mut self) {
        let Some(entry) = self.selected_entry() else {
            self.set_notice("Nothing selected");
            return;
        };
        if entry.is_dir {
            self.set_notice("Preview works on files only");
            return;
        }
        self.preview = Some(PreviewView {
            open: true,
            title: format!("Preview - {}", entry.name),
            text: fs_ops::preview_text(&entry.path),
        });
    }

    fn open_properties(&mut self) {
        let Some(entry) = self.selected_entry() else {
            self.set_notice("Nothing selected");
            return;
        };
        let size_text = if entry.is_dir {
            fs_ops::format_size(fs_ops::directory_size(&entry.path))
        } else {
            fs_ops::format_size(entry.size)
        };
        self.properties = Some(PropertiesView {
            open: true,
            path: entry.path.clone(),
            name: entry.name.clone(),
            location: entry
                .path
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            type_label: fs_ops::file_type_label(&entry.path, entry.is_dir),
            size_text,
            created: format_timestamp(entry.created),
            modified: format_timestamp(entry.modified),
            accessed: format_timestamp(entry.accessed),
            readonly: entry.readonly,
        });
    }

    // --- status line ---

    fn refresh_status_line(&mut self) {
        let shown = self.visible_rows().len();
        let filtered = if shown == self.entries.len() {
            String::new()
        } else {
            format!(" ({shown} shown)")
        };
        let transferring = if let Some(transfer) = &self.active_transfer {
            format!(" | Transferring {}...", transfer.label)
        } else {
            String::new()
        };
        let notice = if self.notice.is_empty() {
            String::new()
        } else {
            format!(" | {}", self.notice)
        };
        self.status_line = format!(
            "{} items{filtered}{transferring}{notice}",
            self.entries.len()
        );
    }

    fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = notice.into();
        self.refresh_status_line();
    }

    fn clear_notice(&mut self) {
        self.notice.clear();
        self.refresh_status_line();
    }

    // --- ui ---

    fn login_ui(&mut self, ctx: &egui::Context) {
        let mut submit = false;
        let mut register = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(60.0);
            ui.vertical_centered(|ui| {
                ui.heading("File Manager");
                ui.label("Sign in to browse files");
                ui.add_space(24.0);

                ui.scope(|ui| {
                    ui.set_max_width(280.0);
                    ui.label("Username");
                    ui.text_edit_singleline(&mut self.login.username);
                    ui.add_space(8.0);
                    ui.label("Password");
                    let password = ui.add(
                        egui::TextEdit::singleline(&mut self.login.password)
                            .password(true)
                            .hint_text("At least 6 characters to register"),
                    );
                    if password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        submit = true;
                    }
                    ui.add_space(16.0);
                    ui.vertical_centered_justified(|ui| {
                        if ui.button("Log in").clicked() {
                            submit = true;
                        }
                        if ui.button("Register new account").clicked() {
                            register = true;
                        }
                    });
                });

                ui.add_space(12.0);
                if !self.login.notice.is_empty() {
                    ui.colored_label(egui::Color32::LIGHT_RED, &self.login.notice);
                }
            });
        });

        if submit {
            self.try_login();
        }
        if register {
            self.try_register();
        }
    }

    fn browser_ui(&mut self, ctx: &egui::Context) {
        self.toolbar_ui(ctx);
        self.status_ui(ctx);
        self.shortcuts_ui(ctx);
        self.listing_ui(ctx);
        self.dialog_ui(ctx);
        self.preview_ui(ctx);
        self.properties_ui(ctx);
    }

    fn toolbar_ui(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(self.history.can_go_back(), egui::Button::new("< Back"))
                    .clicked()
                {
                    self.go_back();
                }
                if ui
                    .add_enabled(
                        self.history.can_go_forward(),
                        egui::Button::new("Forward >"),
                    )
                    .clicked()
                {
                    self.go_forward();
                }
                let at_roots = self.current_dir().is_none();
                if ui.add_enabled(!at_roots, egui::Button::new("Up")).clicked() {
                    self.go_up();
                }
                if ui.button("Refresh").clicked() {
                    self.refresh();
                }
                if ui.button("Go to...").clicked() {
                    let start = self.current_dir().unwrap_or_else(|| PathBuf::from("."));
                    match native_dialog::FileDialog::new()
                        .set_location(&start)
                        .show_open_single_dir()
                    {
                        Ok(Some(dir)) => self.navigate(Location::Dir(dir)),
                        Ok(None) => {}
                        Err(err) => self.set_notice(format!("Browse failed: {err}")),
                    }
                }
                ui.separator();
                ui.label(
                    egui::RichText::new(self.history.current().display_text()).monospace(),
                );
            });

            ui.horizontal(|ui| {
                ui.label("Filter:");
                let filter = ui.add(
                    egui::TextEdit::singleline(&mut self.filter)
                        .desired_width(180.0)
                        .hint_text("Name contains..."),
                );
                if filter.changed() {
                    self.selected = None;
                    self.refresh_status_line();
                }
                ui.separator();
                if ui.button("New Folder").clicked() {
                    self.dialog = Some(PendingDialog::NewFolder {
                        name: String::new(),
                    });
                }
                if ui.button("New File").clicked() {
                    self.dialog = Some(PendingDialog::NewFile {
                        name: String::new(),
                    });
                }
                if ui.button("Rename").clicked() {
                    self.open_rename_dialog();
                }
                if ui.button("Delete").clicked() {
                    self.confirm_delete_selected();
                }
                ui.separator();
                if ui.button("Copy").clicked() {
                    self.copy_selected(TransferKind::Copy);
                }
                if ui.button("Cut").clicked() {
                    self.copy_selected(TransferKind::Move);
                }
                if ui.button("Paste").clicked() {
                    self.paste_clipboard();
                }
                ui.separator();
                if ui.button("Preview").clicked() {
                    self.open_preview();
                }
                if ui.button("Properties").clicked() {
                    self.open_properties();
                }
            });
        });
    }

    fn status_ui(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if let Some(transfer) = &self.active_transfer {
                        let fraction = if transfer.bytes_total > 0 {
                            (transfer.bytes_done as f32 / transfer.bytes_total as f32).min(1.0)
                        } else {
                            0.0
                        };
                        ui.add(
                            egui::ProgressBar::new(fraction)
                                .desired_width(180.0)
                                .text(format!(
                                    "{} / {}",
                                    fs_ops::format_size(transfer.bytes_done),
                                    fs_ops::format_size(transfer.bytes_total),
                                )),
                        );
                        if ui.button("Cancel").clicked() {
                            transfer
                                .cancel
                                .store(true, std::sync::atomic::Ordering::Relaxed);
                        }
                        ui.separator();
                    }
                    ui.label(&self.status_line);
                });
            });
    }

    fn shortcuts_ui(&mut self, ctx: &egui::Context) {
        let mut target: Option<Location> = None;
        egui::SidePanel::left("shortcuts")
            .resizable(false)
            .default_width(150.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                ui.heading("Places");
                ui.separator();
                let current = self.current_dir();
                if ui.selectable_label(current.is_none(), "Computer").clicked() {
                    target = Some(Location::Roots);
                }
                for (label, path) in &self.shortcuts {
                    let here = current.as_deref() == Some(path.as_path());
                    if ui.selectable_label(here, label).clicked() {
                        target = Some(Location::dir(path.clone()));
                    }
                }
            });
        if let Some(location) = target {
            self.navigate(location);
        }
    }

    fn listing_ui(&mut self, ctx: &egui::Context) {
        let mut clicked_row: Option<usize> = None;
        let mut opened_row: Option<usize> = None;
        let mut menu_action: Option<(usize, RowAction)> = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for index in self.visible_rows() {
                        let Some(entry) = self.entries.get(index) else {
                            continue;
                        };
                        let is_selected = self.selected == Some(index);
                        let size_text = if entry.is_dir {
                            "<DIR>".to_string()
                        } else {
                            fs_ops::format_size(entry.size)
                        };
                        let text = egui::RichText::new(format!(
                            "{:<44} {:>10}  {}",
                            truncate_name(&entry.name, 44),
                            size_text,
                            format_timestamp(entry.modified),
                        ))
                        .monospace();
                        let response = ui.selectable_label(is_selected, text);
                        if response.clicked() {
                            clicked_row = Some(index);
                        }
                        if response.double_clicked() {
                            opened_row = Some(index);
                        }
                        response.context_menu(|ui| {
                            for (label, action) in [
                                ("Open", RowAction::Open),
                                ("Copy", RowAction::Copy),
                                ("Cut", RowAction::Cut),
                                ("Paste", RowAction::Paste),
                                ("Rename", RowAction::Rename),
                                ("Delete", RowAction::Delete),
                                ("Preview", RowAction::Preview),
                                ("Properties", RowAction::Properties),
                            ] {
                                if ui.button(label).clicked() {
                                    menu_action = Some((index, action));
                                    ui.close_menu();
                                }
                            }
                        });
                    }
                    if self.entries.is_empty() {
                        ui.weak("This folder is empty");
                    }
                });
        });

        if let Some(index) = clicked_row {
            self.selected = Some(index);
        }
        if let Some(index) = opened_row {
            self.selected = Some(index);
            self.open_row(index);
        }
        if let Some((index, action)) = menu_action {
            self.apply_row_action(index, action);
        }
    }

    // Right-click menu on a row acts on that row, whatever was selected.
    fn apply_row_action(&mut self, index: usize, action: RowAction) {
        self.selected = Some(index);
        match action {
            RowAction::Open => self.open_row(index),
            RowAction::Copy => self.copy_selected(TransferKind::Copy),
            RowAction::Cut => self.copy_selected(TransferKind::Move),
            RowAction::Paste => self.paste_clipboard(),
            RowAction::Rename => self.open_rename_dialog(),
            RowAction::Delete => self.confirm_delete_selected(),
            RowAction::Preview => self.open_preview(),
            RowAction::Properties => self.open_properties(),
        }
    }

    fn dialog_ui(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.dialog.take() else {
            return;
        };
        let mut keep_open = true;

        match &mut dialog {
            PendingDialog::NewFolder { name } => {
                let mut confirmed = false;
                input_dialog(
                    ctx,
                    "New Folder",
                    "Folder name:",
                    name,
                    &mut confirmed,
                    &mut keep_open,
                );
                if confirmed {
                    keep_open = false;
                    let name = name.clone();
                    match self.current_dir() {
                        Some(dir) => match fs_ops::create_dir(&dir, &name) {
                            Ok(_) => {
                                self.set_notice(format!("Created folder {name}"));
                                self.refresh();
                            }
                            Err(err) => self.set_notice(format!("{err:#}")),
                        },
                        None => self.set_notice("Cannot create folders in the Computer view"),
                    }
                }
            }
            PendingDialog::NewFile { name } => {
                let mut confirmed = false;
                input_dialog(
                    ctx,
                    "New File",
                    "File name:",
                    name,
                    &mut confirmed,
                    &mut keep_open,
                );
                if confirmed {
                    keep_open = false;
                    let name = name.clone();
                    match self.current_dir() {
                        Some(dir) => match fs_ops::create_file(&dir, &name) {
                            Ok(_) => {
                                self.set_notice(format!("Created file {name}"));
                                self.refresh();
                            }
                            Err(err) => self.set_notice(format!("{err:#}")),
                        },
                        None => self.set_notice("Cannot create files in the Computer view"),
                    }
                }
            }
            PendingDialog::Rename { target, name } => {
                let mut confirmed = false;
                input_dialog(
                    ctx,
                    "Rename",
                    "New name:",
                    name,
                    &mut confirmed,
                    &mut keep_open,
                );
                if confirmed {
                    keep_open = false;
                    match fs_ops::rename_path(target, name) {
                        Ok(_) => {
                            self.set_notice("Renamed");
                            self.refresh();
                        }
                        Err(err) => self.set_notice(format!("{err:#}")),
                    }
                }
            }
            PendingDialog::ConfirmDelete { target } => {
                let name = target
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| target.to_string_lossy().to_string());
                let mut confirmed = false;
                egui::Window::new("Delete")
                    .collapsible(false)
                    .resizable(false)
                    .show(ctx, |ui| {
                        ui.label(format!("Delete {name}? This cannot be undone."));
                        ui.horizontal(|ui| {
                            if ui.button("Delete").clicked() {
                                confirmed = true;
                            }
                            if ui.button("Cancel").clicked() {
                                keep_open = false;
                            }
                        });
                    });
                if confirmed {
                    keep_open = false;
                    match fs_ops::delete_path(target) {
                        Ok(()) => {
                            self.set_notice(format!("Deleted {name}"));
                            self.refresh();
                        }
                        Err(err) => self.set_notice(format!("{err:#}")),
                    }
                }
            }
        }

        if keep_open {
            self.dialog = Some(dialog);
        }
    }

    fn preview_ui(&mut self, ctx: &egui::Context) {
        if let Some(preview) = self.preview.as_mut() {
            egui::Window::new(&preview.title)
                .open(&mut preview.open)
                .default_size([480.0, 360.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            ui.add(
                                egui::TextEdit::multiline(&mut preview.text.as_str())
                                    .desired_width(f32::INFINITY)
                                    .font(egui::TextStyle::Monospace),
                            );
                        });
                });
            if !preview.open {
                self.preview = None;
            }
        }
    }

    fn properties_ui(&mut self, ctx: &egui::Context) {
        let mut apply_result: Option<anyhow::Result<()>> = None;
        if let Some(props) = self.properties.as_mut() {
            egui::Window::new(format!("Properties - {}", props.name))
                .open(&mut props.open)
                .resizable(false)
                .show(ctx, |ui| {
                    egui::Grid::new("properties-grid")
                        .num_columns(2)
                        .spacing([16.0, 6.0])
                        .show(ui, |ui| {
                            ui.label("Name:");
                            ui.label(&props.name);
                            ui.end_row();
                            ui.label("Location:");
                            ui.label(&props.location);
                            ui.end_row();
                            ui.label("Type:");
                            ui.label(&props.type_label);
                            ui.end_row();
                            ui.label("Size:");
                            ui.label(&props.size_text);
                            ui.end_row();
                            ui.label("Created:");
                            ui.label(&props.created);
                            ui.end_row();
                            ui.label("Modified:");
                            ui.label(&props.modified);
                            ui.end_row();
                            ui.label("Accessed:");
                            ui.label(&props.accessed);
                            ui.end_row();
                        });
                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.checkbox(&mut props.readonly, "Read-only");
                        if ui.button("Apply").clicked() {
                            apply_result =
                                Some(fs_ops::set_readonly(&props.path, props.readonly));
                        }
                    });
                });
            if !props.open {
                self.properties = None;
            }
        }
        match apply_result {
            Some(Ok(())) => {
                self.set_notice("Permissions updated");
                self.refresh();
            }
            Some(Err(err)) => self.set_notice(format!("{err:#}")),
            None => {}
        }
    }
}

impl eframe::App for FileGuardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_transfer_responses();
        if self.active_transfer.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(16));
        }
        match self.screen {
            Screen::Login => self.login_ui(ctx),
            Screen::Browser => self.browser_ui(ctx),
        }
    }
}

fn input_dialog(
    ctx: &egui::Context,
    title: &str,
    prompt: &str,
    value: &mut String,
    confirmed: &mut bool,
    keep_open: &mut bool,
) {
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(prompt);
            let field = ui.text_edit_singleline(value);
            if field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                *confirmed = true;
            }
            ui.horizontal(|ui| {
                if ui.button("OK").clicked() {
                    *confirmed = true;
                }
                if ui.button("Cancel").clicked() {
                    *keep_open = false;
                }
            });
        });
}

/// Listing for a location: drive roots for the sentinel, directory children
/// otherwise.
fn load_entries(location: &Location) -> anyhow::Result<Vec<EntryInfo>> {
    match location {
        Location::Roots => {
            let mut out = Vec::new();
            for root in fs_ops::list_roots() {
                if let Ok(mut info) = fs_ops::stat_path(&root) {
                    info.name = root.to_string_lossy().to_string();
                    out.push(info);
                }
            }
            Ok(out)
        }
        Location::Dir(path) => fs_ops::list_directory(path),
    }
}

fn build_shortcuts() -> Vec<(String, PathBuf)> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let mut out = vec![("Home".to_string(), home.clone())];
    for name in [
        "Desktop",
        "Documents",
        "Downloads",
        "Pictures",
        "Music",
        "Videos",
    ] {
        let path = home.join(name);
        if path.is_dir() {
            out.push((name.to_string(), path));
        }
    }
    out
}

fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = name.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn format_timestamp(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::UNIX_EPOCH;

    fn test_root(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("fileguard-app-{name}-{nonce}"))
    }

    fn test_app(name: &str) -> (FileGuardApp, PathBuf) {
        let root = test_root(name);
        fs::create_dir_all(&root).expect("create root");
        let store = CredentialStore::load(root.join("users.json")).expect("load store");
        (FileGuardApp::new(store, None), root)
    }

    #[test]
    fn login_with_seeded_admin_enters_browser_at_roots() {
        let (mut app, root) = test_app("login");
        app.login.username = "admin".to_string();
        app.login.password = "admin123".to_string();

        app.try_login();

        assert!(matches!(app.screen, Screen::Browser));
        assert_eq!(app.history.current(), Location::Roots);
        assert!(!app.entries.is_empty());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn failed_login_clears_password_and_shows_generic_message() {
        let (mut app, root) = test_app("login-fail");
        app.login.username = "admin".to_string();
        app.login.password = "nope".to_string();

        app.try_login();

        assert!(matches!(app.screen, Screen::Login));
        assert!(app.login.password.is_empty());
        assert_eq!(app.login.notice, "Invalid username or password");

        // Unknown user reads exactly the same.
        app.login.username = "ghost".to_string();
        app.login.password = "admin123".to_string();
        app.try_login();
        assert_eq!(app.login.notice, "Invalid username or password");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn register_enforces_minimum_password_length() {
        let (mut app, root) = test_app("register-short");
        app.login.username = "alice".to_string();
        app.login.password = "12345".to_string();

        app.try_register();

        assert!(app.login.notice.contains("at least 6 characters"));
        assert!(!app.store.verify("alice", "12345"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn register_then_login_with_new_account() {
        let (mut app, root) = test_app("register");
        app.login.username = "alice".to_string();
        app.login.password = "secret99".to_string();
        app.try_register();
        assert!(app.login.notice.contains("Registration successful"));

        app.login.username = "alice".to_string();
        app.login.password = "secret99".to_string();
        app.try_login();
        assert!(matches!(app.screen, Screen::Browser));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn navigation_flows_through_history() {
        let (mut app, root) = test_app("nav");
        fs::create_dir_all(root.join("inner")).expect("create dir");
        fs::write(root.join("inner/file.txt"), "x").expect("write");

        app.enter_browser();
        app.navigate(Location::dir(&root));
        app.navigate(Location::dir(root.join("inner")));
        assert!(app.entries.iter().any(|e| e.name == "file.txt"));
        assert!(app.history.can_go_back());

        app.go_back();
        assert_eq!(app.history.current(), Location::dir(&root));
        assert!(app.history.can_go_forward());

        // Navigating somewhere new discards the forward branch.
        app.navigate(Location::Roots);
        assert!(!app.history.can_go_forward());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn navigating_to_a_missing_directory_does_not_touch_history() {
        let (mut app, root) = test_app("nav-missing");
        app.enter_browser();
        let before = app.history.len();

        app.navigate(Location::dir(root.join("no-such-dir")));

        assert_eq!(app.history.len(), before);
        assert!(app.notice.starts_with("Cannot open"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn go_up_from_directory_eventually_reaches_roots() {
        let (mut app, root) = test_app("up");
        fs::create_dir_all(root.join("a/b")).expect("create dirs");
        app.enter_browser();
        app.navigate(Location::dir(root.join("a/b")));

        app.go_up();
        assert_eq!(app.history.current(), Location::dir(root.join("a")));

        app.navigate(Location::dir("/"));
        app.go_up();
        assert_eq!(app.history.current(), Location::Roots);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn filter_narrows_visible_rows_without_touching_entries() {
        let (mut app, root) = test_app("filter");
        fs::write(root.join("report.txt"), "x").expect("write");
        fs::write(root.join("notes.md"), "x").expect("write");
        app.enter_browser();
        app.navigate(Location::dir(&root));
        let total = app.entries.len();

        app.filter = "REPORT".to_string();
        let visible = app.visible_rows();
        assert_eq!(visible.len(), 1);
        assert_eq!(app.entries[visible[0]].name, "report.txt");
        assert_eq!(app.entries.len(), total);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn paste_is_rejected_at_the_computer_view() {
        let (mut app, root) = test_app("paste-roots");
        fs::write(root.join("file.txt"), "x").expect("write");
        app.enter_browser();
        app.navigate(Location::dir(&root));
        app.selected = app.entries.iter().position(|e| e.name == "file.txt");
        app.copy_selected(TransferKind::Copy);

        app.navigate(Location::Roots);
        app.paste_clipboard();
        assert!(app.notice.contains("Computer view"));
        assert!(app.active_transfer.is_none());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn paste_into_own_subtree_is_rejected() {
        let (mut app, root) = test_app("paste-cycle");
        fs::create_dir_all(root.join("outer/inner")).expect("create dirs");
        app.enter_browser();
        app.navigate(Location::dir(&root));
        app.selected = app.entries.iter().position(|e| e.name == "outer");
        app.copy_selected(TransferKind::Copy);

        app.navigate(Location::dir(root.join("outer/inner")));
        app.paste_clipboard();
        assert!(app.notice.contains("into itself"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn row_menu_actions_target_the_clicked_row() {
        let (mut app, root) = test_app("row-menu");
        fs::write(root.join("a.txt"), "a").expect("write");
        fs::write(root.join("b.txt"), "b").expect("write");
        app.enter_browser();
        app.navigate(Location::dir(&root));

        let b = app
            .entries
            .iter()
            .position(|e| e.name == "b.txt")
            .expect("b.txt row");
        app.selected = app.entries.iter().position(|e| e.name == "a.txt");

        app.apply_row_action(b, RowAction::Copy);
        assert_eq!(app.selected, Some(b));
        let item = app.clipboard.clone().expect("clipboard");
        assert_eq!(item.kind, TransferKind::Copy);
        assert!(item.path.ends_with("b.txt"));

        app.apply_row_action(b, RowAction::Delete);
        assert!(matches!(
            app.dialog,
            Some(PendingDialog::ConfirmDelete { ref target }) if target.ends_with("b.txt")
        ));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn timestamps_render_in_local_time() {
        use chrono::{NaiveDateTime, TimeZone};

        let secs = 1_700_000_000i64;
        let time = UNIX_EPOCH + std::time::Duration::from_secs(secs as u64);
        let shown = format_timestamp(Some(time));

        // Parsing the column back in the machine's timezone must land on the
        // same instant, whatever that timezone is.
        let parsed =
            NaiveDateTime::parse_from_str(&shown, "%Y-%m-%d %H:%M:%S").expect("parse column");
        let local = Local
            .from_local_datetime(&parsed)
            .single()
            .expect("unambiguous local time");
        assert_eq!(local.timestamp(), secs);
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn shortcuts_start_at_the_home_directory() {
        let shortcuts = build_shortcuts();
        match dirs::home_dir() {
            Some(home) => {
                assert_eq!(shortcuts.first(), Some(&("Home".to_string(), home)));
            }
            None => assert!(shortcuts.is_empty()),
        }
    }

    #[test]
    fn truncate_name_keeps_short_names_intact() {
        assert_eq!(truncate_name("short.txt", 44), "short.txt");
        let long = "x".repeat(60);
        let out = truncate_name(&long, 44);
        assert_eq!(out.chars().count(), 44);
        assert!(out.ends_with("..."));
    }
}
