use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use walkdir::WalkDir;

/// One row of a directory listing, with the metadata the browser and the
/// properties window display.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub readonly: bool,
}

impl EntryInfo {
    fn from_metadata(name: String, path: PathBuf, metadata: &fs::Metadata) -> Self {
        Self {
            name,
            path,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            created: metadata.created().ok(),
            accessed: metadata.accessed().ok(),
            readonly: metadata.permissions().readonly(),
        }
    }
}

/// List the direct children of `path`, directories first, names compared
/// case-insensitively. Entries whose metadata cannot be read are skipped.
pub fn list_directory(path: &Path) -> Result<Vec<EntryInfo>> {
    let iter = fs::read_dir(path)
        .with_context(|| format!("failed to list directory {}", path.display()))?;

    let mut entries: Vec<EntryInfo> = Vec::new();
    for entry in iter.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        entries.push(EntryInfo::from_metadata(name, entry.path(), &metadata));
    }
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(entries)
}

/// Top-level roots for the "Computer" view: drive letters on Windows, the
/// filesystem root elsewhere.
pub fn list_roots() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        ('A'..='Z')
            .map(|letter| PathBuf::from(format!("{letter}:\\")))
            .filter(|p| p.exists())
            .collect()
    }
    #[cfg(not(windows))]
    {
        vec![PathBuf::from("/")]
    }
}

pub fn stat_path(path: &Path) -> Result<EntryInfo> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    Ok(EntryInfo::from_metadata(name, path.to_path_buf(), &metadata))
}

/// Delete a file, or a directory tree recursively.
pub fn delete_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to delete directory {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))
    }
}

/// Rename within the same directory. `new_name` must be a bare name, not a
/// path.
pub fn rename_path(path: &Path, new_name: &str) -> Result<PathBuf> {
    if new_name.is_empty() {
        bail!("new name is empty");
    }
    if new_name.contains(['/', '\\']) {
        bail!("new name must not contain path separators");
    }
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let dest = parent.join(new_name);
    if dest.exists() {
        bail!("{} already exists", dest.display());
    }
    fs::rename(path, &dest)
        .with_context(|| format!("failed to rename {}", path.display()))?;
    Ok(dest)
}

pub fn create_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) {
        bail!("invalid folder name");
    }
    let path = parent.join(name);
    fs::create_dir(&path)
        .with_context(|| format!("failed to create folder {}", path.display()))?;
    Ok(path)
}

/// Create an empty file, failing if one already exists.
pub fn create_file(parent: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) {
        bail!("invalid file name");
    }
    let path = parent.join(name);
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create file {}", path.display()))?;
    Ok(path)
}

/// Pick a non-clashing destination inside `dest_dir` for something named
/// `file_name`, appending " (n)" before the extension when needed.
pub fn unique_destination(dest_dir: &Path, file_name: &str) -> PathBuf {
    let direct = dest_dir.join(file_name);
    if !direct.exists() {
        return direct;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (file_name.to_string(), String::new()),
    };
    for n in 1.. {
        let candidate = dest_dir.join(format!("{stem} ({n}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

pub fn set_readonly(path: &Path, readonly: bool) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let mut permissions = metadata.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(readonly);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("failed to change permissions of {}", path.display()))
}

/// Total bytes under `path`, following no symlinks. Unreadable entries are
/// skipped rather than failing the whole walk.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Coarse type label for the properties window.
pub fn file_type_label(path: &Path, is_dir: bool) -> String {
    if is_dir {
        return "File folder".to_string();
    }
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return "File".to_string();
    };
    let ext = ext.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" | "log" => "Text document".to_string(),
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" => "Image".to_string(),
        "mp3" | "wav" | "flac" | "ogg" => "Audio".to_string(),
        "mp4" | "mkv" | "avi" | "mov" => "Video".to_string(),
        "zip" | "tar" | "gz" | "7z" | "rar" => "Archive".to_string(),
        "pdf" => "PDF document".to_string(),
        _ => format!("{} file", ext.to_ascii_uppercase()),
    }
}

const PREVIEW_MAX_LINES: usize = 40;
const PREVIEW_MAX_BYTES: usize = 64 * 1024;

/// Bounded text preview. Binary or unreadable content is reported in the
/// text itself rather than as an error.
pub fn preview_text(path: &Path) -> String {
    match read_preview_lines(path, PREVIEW_MAX_LINES, PREVIEW_MAX_BYTES) {
        Ok(lines) if lines.is_empty() => "<empty file>".to_string(),
        Ok(lines) => lines.join("\n"),
        Err(_) => "<binary or unreadable file>".to_string(),
    }
}

fn read_preview_lines(path: &Path, max_lines: usize, max_bytes: usize) -> std::io::Result<Vec<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut out = Vec::new();
    let mut bytes_read = 0usize;

    while out.len() < max_lines && bytes_read < max_bytes {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        bytes_read = bytes_read.saturating_add(n);
        out.push(line.trim_end_matches(['\r', '\n']).to_string());
    }

    Ok(out)
}

/// Open a file with the platform's default application.
pub fn open_with_default(path: &Path) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        Command::new("cmd")
            .args(["/C", "start", "", &path.to_string_lossy()])
            .spawn()
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(())
    }
    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(path)
            .spawn()
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(())
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open")
            .arg(path)
            .spawn()
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(())
    }
}
