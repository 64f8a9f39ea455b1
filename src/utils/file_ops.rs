//! Filoperationer för mediafiler

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Kopiera en fil till destinationskatalog
/// Skapar katalogen om den inte finns
pub fn copy_file_to_directory(source: &Path, dest_dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Kunde inte skapa katalog: {:?}", dest_dir))?;

    let dest_path = dest_dir.join(filename);

    fs::copy(source, &dest_path)
        .with_context(|| format!("Kunde inte kopiera fil från {:?} till {:?}", source, dest_path))?;

    Ok(dest_path)
}

/// Sök rekursivt efter en fil med givet namn (skiftlägesokänsligt)
pub fn find_file_by_name(dir: &Path, filename: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let wanted = filename.to_lowercase();

    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| e.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|e| e.path().to_path_buf())
}

/// Filnamnet i en sökväg som kan vara skriven för Windows
pub fn file_name_of(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Generera unikt filnamn om filen redan finns
pub fn unique_filename(dir: &Path, filename: &str) -> String {
    let path = dir.join(filename);

    if !path.exists() {
        return filename.to_string();
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let extension = Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    for i in 2..1000 {
        let new_name = format!("{}_{}{}", stem, i, extension);
        if !dir.join(&new_name).exists() {
            return new_name;
        }
    }

    let timestamp = chrono::Utc::now().timestamp();
    format!("{}_{}{}", stem, timestamp, extension)
}

/// Har två filer samma innehåll?
pub fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    let meta_a = fs::metadata(a)?;
    let meta_b = fs::metadata(b)?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

/// Hämta filändelse (lowercase)
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
