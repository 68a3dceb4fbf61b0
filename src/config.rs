use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::convert::{ConversionOptions, DEFAULT_HIGHLIGHT_COLOR};
use crate::mapping::MIN_COLUMN_SCORE;

pub const CONFIG_FILE_NAME: &str = "tcvn3-unicode.toml";
pub const CONFIG_ENV_VAR: &str = "TCVN3_UNICODE_CONFIG";

const DEFAULT_MAP_PATH: &str = "tcvn3_map.json";
const DEFAULT_MAP_CSV_PATH: &str = "tcvn3_map.csv";
const DEFAULT_REPORT_SUFFIX: &str = "_conversion_log.txt";
const DEFAULT_OUTPUT_SUFFIX: &str = "_unicode";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub mapping: MappingSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub convert: ConvertSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MappingSection {
    /// Persisted mapping, relative to the config file directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Tried when `path` does not exist.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BuildSection {
    #[serde(default)]
    pub has_header: Option<bool>,
    /// Minimum winning column score for content-based column identification.
    #[serde(default)]
    pub min_column_score: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConvertSection {
    #[serde(default)]
    pub skip_already_unicode: Option<bool>,
    #[serde(default)]
    pub highlight: Option<bool>,
    #[serde(default)]
    pub highlight_color: Option<String>,
    #[serde(default)]
    pub write_report: Option<bool>,
    #[serde(default)]
    pub report_suffix: Option<String>,
    #[serde(default)]
    pub output_suffix: Option<String>,
}

/// Config with defaults filled in and relative paths resolved.
#[derive(Clone, Debug)]
pub struct ToolConfig {
    pub config_path: PathBuf,
    pub map_path: PathBuf,
    pub map_csv_path: PathBuf,
    pub has_header: bool,
    pub min_column_score: f64,
    pub skip_already_unicode: bool,
    pub highlight: bool,
    pub highlight_color: String,
    pub write_report: bool,
    pub report_suffix: String,
    pub output_suffix: String,
}

impl ToolConfig {
    /// Explicit path first, then the environment variable, then an upward search from the
    /// working directory. A missing file leaves every setting at its default.
    pub fn resolve(explicit: Option<PathBuf>, workdir: &Path) -> anyhow::Result<Self> {
        let cfg_file = explicit
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(workdir, CONFIG_FILE_NAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
                tracing::debug!(path = %p.display(), "config loaded");
            }
        }
        let config_path = cfg_file.unwrap_or_else(|| workdir.join(CONFIG_FILE_NAME));
        Ok(Self::from_file_config(file_cfg, config_path))
    }

    pub fn from_file_config(file_cfg: AppConfig, config_path: PathBuf) -> Self {
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let relative_to_config = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

        let map_path = relative_to_config(
            file_cfg
                .mapping
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MAP_PATH)),
        );
        let map_csv_path = relative_to_config(
            file_cfg
                .mapping
                .csv_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MAP_CSV_PATH)),
        );
        let convert = file_cfg.convert;
        let non_empty = |s: Option<String>, default: &str| {
            s.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            config_path,
            map_path,
            map_csv_path,
            has_header: file_cfg.build.has_header.unwrap_or(true),
            min_column_score: file_cfg
                .build
                .min_column_score
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(MIN_COLUMN_SCORE),
            skip_already_unicode: convert.skip_already_unicode.unwrap_or(true),
            highlight: convert.highlight.unwrap_or(false),
            highlight_color: non_empty(convert.highlight_color, DEFAULT_HIGHLIGHT_COLOR),
            write_report: convert.write_report.unwrap_or(true),
            report_suffix: non_empty(convert.report_suffix, DEFAULT_REPORT_SUFFIX),
            output_suffix: non_empty(convert.output_suffix, DEFAULT_OUTPUT_SUFFIX),
        }
    }

    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            skip_already_unicode: self.skip_already_unicode,
            highlight: self.highlight.then(|| self.highlight_color.clone()),
        }
    }

    /// JSON mapping first, then its CSV sibling.
    pub fn map_candidates(&self) -> [&Path; 2] {
        [self.map_path.as_path(), self.map_csv_path.as_path()]
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

const DEFAULT_CONFIG_TOML: &str = r##"[mapping]
# Relative paths resolve against this file's directory.
path = "tcvn3_map.json"
csv_path = "tcvn3_map.csv"

[build]
# First row of each CSV source table is a header row.
has_header = true
# Content-scored columns below this share of matching cells are rejected.
min_column_score = 0.2

[convert]
skip_already_unicode = true
highlight = false
highlight_color = "#FFFF00"
write_report = true
report_suffix = "_conversion_log.txt"
output_suffix = "_unicode"
"##;

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = ToolConfig::from_file_config(AppConfig::default(), PathBuf::from("/etc/x/t.toml"));
        assert_eq!(cfg.map_path, PathBuf::from("/etc/x/tcvn3_map.json"));
        assert_eq!(cfg.map_csv_path, PathBuf::from("/etc/x/tcvn3_map.csv"));
        assert!(cfg.has_header);
        assert_eq!(cfg.min_column_score, MIN_COLUMN_SCORE);
        assert_eq!(cfg.conversion_options(), ConversionOptions::default());
        assert_eq!(cfg.output_suffix, "_unicode");
    }

    #[test]
    fn init_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_default_config(dir.path(), false).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.build.min_column_score, Some(0.2));
        assert_eq!(cfg.convert.highlight_color.as_deref(), Some("#FFFF00"));

        std::fs::write(&path, "[convert]\nhighlight = true\n").unwrap();
        init_default_config(dir.path(), false).unwrap();
        let kept = std::fs::read_to_string(&path).unwrap();
        assert!(kept.starts_with("[convert]"));
        init_default_config(dir.path(), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("[mapping]"));
    }

    #[test]
    fn overrides_apply() {
        let cfg: AppConfig = toml::from_str(
            r##"
[mapping]
path = "/abs/map.json"

[build]
min_column_score = 0.35

[convert]
highlight = true
highlight_color = "#00FF00"
skip_already_unicode = false
"##,
        )
        .unwrap();
        let cfg = ToolConfig::from_file_config(cfg, PathBuf::from("cfg/t.toml"));
        assert_eq!(cfg.map_path, PathBuf::from("/abs/map.json"));
        assert_eq!(cfg.map_csv_path, PathBuf::from("cfg/tcvn3_map.csv"));
        assert_eq!(cfg.min_column_score, 0.35);
        let opts = cfg.conversion_options();
        assert!(!opts.skip_already_unicode);
        assert_eq!(opts.highlight.as_deref(), Some("#00FF00"));
    }
}
