use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::gedcom::RecordKind;

/// Hur en post som redan finns i trädet hanteras
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Skriv över alla fält
    #[default]
    Replace,
    /// Fyll bara i tomma fält
    Merge,
    /// Lämna befintlig post orörd
    Skip,
    /// Behåll båda, nytt id för krockande poster
    KeepBoth,
    /// Nytt id för alla poster (förskjutning efter högsta befintliga)
    AppendWithOffset,
}

impl DuplicatePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replace => "Ersätt",
            Self::Merge => "Slå ihop",
            Self::Skip => "Hoppa över",
            Self::KeepBoth => "Behåll båda",
            Self::AppendWithOffset => "Lägg till med förskjutning",
        }
    }

    pub fn all() -> &'static [DuplicatePolicy] {
        &[
            Self::Replace,
            Self::Merge,
            Self::Skip,
            Self::KeepBoth,
            Self::AppendWithOffset,
        ]
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(Self::Replace),
            "merge" => Some(Self::Merge),
            "skip" => Some(Self::Skip),
            "keep_both" | "keep-both" => Some(Self::KeepBoth),
            "append_with_offset" | "append" => Some(Self::AppendWithOffset),
            _ => None,
        }
    }

    /// Skapar policyn nya id:n?
    pub fn mints_ids(&self) -> bool {
        matches!(self, Self::KeepBoth | Self::AppendWithOffset)
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Merge => write!(f, "merge"),
            Self::Skip => write!(f, "skip"),
            Self::KeepBoth => write!(f, "keep_both"),
            Self::AppendWithOffset => write!(f, "append_with_offset"),
        }
    }
}

/// Hur befintliga personer matchas mot importerade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Endast samma GEDCOM-id
    #[default]
    Id,
    /// Namn, födelsedatum och födelseort
    Standard,
    /// Normaliserat namn och födelseår ±2
    Fuzzy,
}

impl MatchStrategy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "standard" => Some(Self::Standard),
            "fuzzy" => Some(Self::Fuzzy),
            _ => None,
        }
    }
}

/// Körläge för en importjobb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// En körning, framsteg var `progress_interval`:e post
    #[default]
    Standard,
    /// Poster i block, framsteg efter varje block, kan återupptas
    Chunked,
}

/// Vad som görs med levande personer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivingPrivacy {
    /// Importera allt, markera som levande
    #[default]
    Keep,
    /// Importera namn men ta bort datum och orter, markera som privat
    RedactDetails,
    /// Importera inte levande personer
    Skip,
}

/// Vilka posttyper som importeras
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordToggles {
    pub individuals: bool,
    pub families: bool,
    pub sources: bool,
    pub repositories: bool,
    pub notes: bool,
    pub media: bool,
}

impl Default for RecordToggles {
    fn default() -> Self {
        Self {
            individuals: true,
            families: true,
            sources: true,
            repositories: true,
            notes: true,
            media: true,
        }
    }
}

impl RecordToggles {
    pub fn enabled(&self, kind: &RecordKind) -> bool {
        match kind {
            RecordKind::Individual => self.individuals,
            RecordKind::Family => self.families,
            RecordKind::Source => self.sources,
            RecordKind::Repository => self.repositories,
            RecordKind::Note => self.notes,
            RecordKind::Media => self.media,
            _ => false,
        }
    }
}

pub const MIN_CHUNK_SIZE: usize = 50;
pub const MAX_CHUNK_SIZE: usize = 5000;

/// Inställningar för GEDCOM-import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub duplicate_policy: DuplicatePolicy,
    pub match_strategy: MatchStrategy,
    /// Hela importen i en transaktion
    pub use_transactions: bool,
    pub execution_mode: ExecutionMode,
    pub chunk_size: usize,
    pub progress_interval: usize,
    /// Tidsbudget per körning, 0 = obegränsad
    pub timeout_seconds: u64,
    pub living_threshold_years: i32,
    pub living_privacy: LivingPrivacy,
    pub records: RecordToggles,
    pub copy_media_files: bool,
    pub media_base_dir: Option<PathBuf>,
    pub media_target_dir: Option<PathBuf>,
    pub declared_encoding: Option<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            match_strategy: MatchStrategy::default(),
            use_transactions: false,
            execution_mode: ExecutionMode::default(),
            chunk_size: 500,
            progress_interval: 100,
            timeout_seconds: 0,
            living_threshold_years: 100,
            living_privacy: LivingPrivacy::default(),
            records: RecordToggles::default(),
            copy_media_files: false,
            media_base_dir: None,
            media_target_dir: None,
            declared_encoding: None,
        }
    }
}

impl ImportSettings {
    /// Blockstorlek begränsad till tillåtet intervall
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }

    pub fn effective_progress_interval(&self) -> usize {
        self.progress_interval.max(1)
    }

    /// Standardsökväg för inställningsfilen
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("se", "genlib", "Genlib")
            .map(|dirs| dirs.config_dir().join("import.toml"))
            .unwrap_or_else(|| PathBuf::from("import.toml"))
    }

    /// Ladda från standardsökvägen, standardvärden om filen saknas eller är trasig
    pub fn load() -> Self {
        let path = Self::default_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("Kunde inte läsa {}: {:#}", path.display(), e);
                }
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Kunde inte läsa inställningar: {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Ogiltiga inställningar i {}", path.display()))?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_toml_roundtrip() {
        let settings = ImportSettings {
            duplicate_policy: DuplicatePolicy::KeepBoth,
            execution_mode: ExecutionMode::Chunked,
            media_base_dir: Some(PathBuf::from("/tmp/media")),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let loaded: ImportSettings = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let loaded: ImportSettings = toml::from_str(
            r#"
duplicate_policy = "merge"
chunk_size = 10

[records]
media = false
"#,
        )
        .unwrap();
        assert_eq!(loaded.duplicate_policy, DuplicatePolicy::Merge);
        assert_eq!(loaded.progress_interval, 100);
        assert_eq!(loaded.living_threshold_years, 100);
        assert!(loaded.records.individuals);
        assert!(!loaded.records.media);
        assert_eq!(loaded.effective_chunk_size(), MIN_CHUNK_SIZE);
    }

    #[test]
    fn test_chunk_size_is_clamped() {
        let mut settings = ImportSettings::default();
        settings.chunk_size = 100_000;
        assert_eq!(settings.effective_chunk_size(), MAX_CHUNK_SIZE);
        settings.chunk_size = 800;
        assert_eq!(settings.effective_chunk_size(), 800);
    }

    #[test]
    fn test_policy_strings() {
        for policy in DuplicatePolicy::all() {
            assert_eq!(DuplicatePolicy::from_db_str(&policy.to_string()), Some(*policy));
        }
        assert_eq!(DuplicatePolicy::from_db_str("append"), Some(DuplicatePolicy::AppendWithOffset));
        assert!(DuplicatePolicy::KeepBoth.mints_ids());
        assert!(!DuplicatePolicy::Merge.mints_ids());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.toml");
        let settings = ImportSettings {
            use_transactions: true,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        let loaded = ImportSettings::load_from(&path).unwrap();
        assert!(loaded.use_transactions);

        assert!(ImportSettings::load_from(&dir.path().join("saknas.toml")).is_err());
    }
}
