//! `CastConfig`: the record `spec.md` §6 passes as the CLI contract's
//! config bag, made concrete and loadable from an on-disk TOML file the way
//! `core_config::load_from` loads `oxidized.toml`. CLI flags (in `cast-bin`)
//! override whatever this loads, field by field.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use cast_block::{ColSepMode, TARGET_BLOCK_BYTES};
use cast_codec::{CoderKind, DEFAULT_DICT_SIZE, DEFAULT_THREADS};
use cast_registry::MAX_TEMPLATES;
use cast_sampler::SAMPLE_ROWS;

/// Rows sampled to estimate mean row length when computing `ROWS_PER_BLOCK`
/// for indexed containers (`spec.md` §4.F).
pub const ROW_SIZE_SAMPLE_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColSepModeChoice {
    Sentinel,
    LengthPrefixed,
}

impl ColSepModeChoice {
    pub fn to_colsep(&self) -> ColSepMode {
        match self {
            ColSepModeChoice::Sentinel => ColSepMode::Sentinel,
            ColSepModeChoice::LengthPrefixed => ColSepMode::LengthPrefixed,
        }
    }
}

/// Fully resolved configuration for one compress/decompress/verify run.
#[derive(Debug, Clone)]
pub struct CastConfig {
    pub target_block_bytes: usize,
    pub sample_rows: usize,
    pub max_templates: usize,
    pub dict_size: u32,
    pub threads: u32,
    pub colsep: ColSepModeChoice,
    pub indexed: bool,
    pub coder: CoderKind,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            target_block_bytes: TARGET_BLOCK_BYTES,
            sample_rows: SAMPLE_ROWS,
            max_templates: MAX_TEMPLATES,
            dict_size: DEFAULT_DICT_SIZE,
            threads: DEFAULT_THREADS,
            colsep: ColSepModeChoice::LengthPrefixed,
            indexed: false,
            coder: CoderKind::Native,
        }
    }
}

/// On-disk shape of `cast.toml`. Every field optional; absent fields keep
/// `CastConfig::default()`'s value. Unknown keys are ignored, same
/// forward-compatibility posture as the teacher's `ConfigFile`.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    block: BlockSection,
    #[serde(default)]
    codec: CodecSection,
}

#[derive(Debug, Deserialize, Default)]
struct BlockSection {
    target_block_bytes: Option<usize>,
    sample_rows: Option<usize>,
    max_templates: Option<usize>,
    colsep: Option<String>,
    indexed: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CodecSection {
    dict_size: Option<u32>,
    threads: Option<u32>,
    backend: Option<String>,
}

/// Default discovery path, mirroring `core_config::discover`'s
/// current-directory lookup.
pub fn discover() -> PathBuf {
    PathBuf::from("cast.toml")
}

/// Loads configuration from `path` (or the discovery default when `None`),
/// falling back to `CastConfig::default()` when the file is absent or fails
/// to parse — the same resilience posture as `core_config::load_from`.
pub fn load_from(path: Option<&Path>) -> CastConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(discover);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return CastConfig::default();
    };
    let file = match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config parse failed, using defaults");
            return CastConfig::default();
        }
    };

    let mut config = CastConfig::default();
    if let Some(v) = file.block.target_block_bytes {
        config.target_block_bytes = v;
    }
    if let Some(v) = file.block.sample_rows {
        config.sample_rows = v;
    }
    if let Some(v) = file.block.max_templates {
        config.max_templates = v;
    }
    if let Some(v) = file.block.indexed {
        config.indexed = v;
    }
    if let Some(s) = file.block.colsep.as_deref() {
        config.colsep = match s {
            "sentinel" => ColSepModeChoice::Sentinel,
            "length_prefixed" => ColSepModeChoice::LengthPrefixed,
            other => {
                tracing::warn!(value = other, "unknown colsep mode, keeping default");
                config.colsep
            }
        };
    }
    if let Some(v) = file.codec.dict_size {
        config.dict_size = v;
    }
    if let Some(v) = file.codec.threads {
        config.threads = v;
    }
    if let Some(s) = file.codec.backend.as_deref() {
        config.coder = match s {
            "7zip" => CoderKind::External7z,
            "native" => CoderKind::Native,
            other => {
                tracing::warn!(value = other, "unknown codec backend, keeping default");
                config.coder
            }
        };
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_from(Some(Path::new("__cast_nonexistent__.toml")));
        assert_eq!(config.target_block_bytes, TARGET_BLOCK_BYTES);
        assert!(!config.indexed);
    }

    #[test]
    fn parses_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cast.toml");
        std::fs::write(
            &path,
            r#"
            [block]
            target_block_bytes = 4096
            indexed = true
            colsep = "sentinel"

            [codec]
            threads = 4
            backend = "7zip"
            "#,
        )
        .unwrap();
        let config = load_from(Some(&path));
        assert_eq!(config.target_block_bytes, 4096);
        assert!(config.indexed);
        assert_eq!(config.colsep, ColSepModeChoice::Sentinel);
        assert_eq!(config.threads, 4);
        assert_eq!(config.coder, CoderKind::External7z);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cast.toml");
        std::fs::write(&path, "not valid toml [[[").unwrap();
        let config = load_from(Some(&path));
        assert_eq!(config.target_block_bytes, TARGET_BLOCK_BYTES);
    }
}
