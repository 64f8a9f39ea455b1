//! Mediafiler som GEDCOM-filen refererar till
//!
//! Sökvägar i OBJE-poster är ofta skrivna på en annan dator. Filen letas
//! upp relativt GEDCOM-filen och i vanliga mediakataloger innan den
//! kopieras in i den hanterade mediakatalogen.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::file_ops;
use crate::utils::path::sanitize_filename;
use crate::utils::{AppError, AppResult};

/// Kataloger bredvid GEDCOM-filen där program brukar lägga media
const MEDIA_SUBDIRS: [&str; 4] = ["media", "Media", "multimedia", "Pictures"];

/// Lagring av importerade mediafiler
pub trait MediaStorage {
    /// Hitta filen som en sökväg i GEDCOM-filen avser
    fn locate(&self, file_path: &str) -> Option<PathBuf>;

    /// Kopiera in en fil, returnerar den lagrade sökvägen
    fn store(&self, source: &Path) -> AppResult<PathBuf>;
}

/// Mediafiler i en lokal katalog
pub struct LocalMediaStorage {
    /// Katalogen GEDCOM-filen ligger i
    base_dir: Option<PathBuf>,
    /// GEDCOM-filens namn utan ändelse
    gedcom_stem: Option<String>,
    target_dir: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(base_dir: Option<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir,
            gedcom_stem: None,
            target_dir: target_dir.into(),
        }
    }

    pub fn with_gedcom_stem(mut self, stem: impl Into<String>) -> Self {
        self.gedcom_stem = Some(stem.into());
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        let Some(base) = &self.base_dir else {
            return Vec::new();
        };
        let mut dirs = vec![base.clone()];
        dirs.extend(MEDIA_SUBDIRS.iter().map(|d| base.join(d)));
        if let Some(stem) = &self.gedcom_stem {
            dirs.push(base.join(format!("{}_media", stem)));
        }
        dirs
    }
}

impl MediaStorage for LocalMediaStorage {
    fn locate(&self, file_path: &str) -> Option<PathBuf> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return None;
        }

        let direct = PathBuf::from(file_path);
        if direct.is_file() {
            return Some(direct);
        }

        let normalized = file_path.replace('\\', "/");
        if let Some(base) = &self.base_dir {
            let relative = base.join(normalized.trim_start_matches('/'));
            if relative.is_file() {
                return Some(relative);
            }
        }

        let name = file_ops::file_name_of(file_path)?;
        let dirs = self.search_dirs();

        if let Some(found) = dirs.iter().map(|d| d.join(name)).find(|p| p.is_file()) {
            return Some(found);
        }

        // Sista utvägen: sök i hela baskatalogen
        let base = self.base_dir.as_deref()?;
        let found = file_ops::find_file_by_name(base, name);
        if found.is_none() {
            debug!("Mediafil hittades inte: {}", file_path);
        }
        found
    }

    fn store(&self, source: &Path) -> AppResult<PathBuf> {
        if !source.is_file() {
            return Err(AppError::not_found(source.display().to_string()));
        }

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_filename)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::validation(format!("Ogiltigt filnamn: {}", source.display())))?;

        // Samma fil importerad tidigare återanvänds
        let existing = self.target_dir.join(&name);
        if existing.is_file() && file_ops::same_contents(source, &existing)? {
            return Ok(existing);
        }

        let name = file_ops::unique_filename(&self.target_dir, &name);
        Ok(file_ops::copy_file_to_directory(source, &self.target_dir, &name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_locate_windows_path_in_media_dir() {
        let base = tempdir().unwrap();
        let media = base.path().join("media");
        fs::create_dir_all(&media).unwrap();
        fs::write(media.join("farfar.jpg"), "bild").unwrap();

        let storage = LocalMediaStorage::new(Some(base.path().to_path_buf()), base.path().join("ut"));
        let found = storage.locate("C:\\Mina bilder\\farfar.jpg").unwrap();
        assert_eq!(found, media.join("farfar.jpg"));
        assert!(storage.locate("saknas.jpg").is_none());
        assert!(storage.locate("  ").is_none());
    }

    #[test]
    fn test_locate_gedcom_media_dir_and_deep_search() {
        let base = tempdir().unwrap();
        let own = base.path().join("familj_media");
        let deep = base.path().join("arkiv").join("1900");
        fs::create_dir_all(&own).unwrap();
        fs::create_dir_all(&deep).unwrap();
        fs::write(own.join("a.png"), "a").unwrap();
        fs::write(deep.join("b.png"), "b").unwrap();

        let storage = LocalMediaStorage::new(Some(base.path().to_path_buf()), base.path().join("ut"))
            .with_gedcom_stem("familj");
        assert_eq!(storage.locate("a.png").unwrap(), own.join("a.png"));
        assert_eq!(storage.locate("bilder/b.png").unwrap(), deep.join("b.png"));
    }

    #[test]
    fn test_store_copies_and_reuses() {
        let base = tempdir().unwrap();
        let source = base.path().join("foto.jpg");
        fs::write(&source, "innehåll").unwrap();

        let storage = LocalMediaStorage::new(None, base.path().join("ut"));
        let first = storage.store(&source).unwrap();
        let second = storage.store(&source).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "innehåll");

        // Annat innehåll med samma namn får nytt namn
        let other_dir = base.path().join("annan");
        fs::create_dir_all(&other_dir).unwrap();
        let other = other_dir.join("foto.jpg");
        fs::write(&other, "annat").unwrap();
        let third = storage.store(&other).unwrap();
        assert_eq!(third.file_name().unwrap(), "foto_2.jpg");

        assert!(storage.store(&base.path().join("saknas.jpg")).is_err());
    }
}
