use std::path::{Path, PathBuf};

/// Hämta databassökväg
pub fn get_database_path() -> PathBuf {
    directories::ProjectDirs::from("se", "genlib", "Genlib")
        .map(|dirs| dirs.data_dir().join("genlib.db"))
        .unwrap_or_else(|| PathBuf::from("genlib.db"))
}

/// Hämta katalog för importerade mediafiler
pub fn get_media_dir() -> PathBuf {
    directories::ProjectDirs::from("se", "genlib", "Genlib")
        .map(|dirs| dirs.data_dir().join("media"))
        .unwrap_or_else(|| PathBuf::from("media"))
}

/// Normalisera sökväg för visning
pub fn display_path(path: &Path) -> String {
    // Förkorta hemkatalogen till ~
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

/// Skapa en säker filnamn från en sträng
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// GEDCOM-filens namn utan ändelse, används för `<namn>_media`-kataloger
pub fn gedcom_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("hello world"), "hello world");
        assert_eq!(sanitize_filename("hello/world"), "hello_world");
        assert_eq!(sanitize_filename("file:name"), "file_name");
        assert_eq!(sanitize_filename("test<>file"), "test__file");
    }

    #[test]
    fn test_gedcom_stem() {
        assert_eq!(gedcom_stem(Path::new("/data/familj.ged")).as_deref(), Some("familj"));
    }
}
