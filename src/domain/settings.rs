//! Resolution and validation of the `[data]`, `[store]` and `[log]` settings.

use crate::domain::error::KsauError;
use crate::ports::config_port::ConfigPort;
use std::path::{Path, PathBuf};

pub const DEFAULT_KNOTS: &str = "knotinfo_data_complete.csv";
pub const DEFAULT_LINKS: &str = "linkinfo_data_complete.csv";
pub const DEFAULT_CONSTANTS: &str = "physical_constants.json";
pub const DEFAULT_ASSIGNMENTS: &str = "topology_assignments.json";
pub const DEFAULT_KEEP: i64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Where every SSoT source lives. Relative names resolve against `[data] dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct SsotPaths {
    pub knots: PathBuf,
    /// `links =` left empty disables the link table.
    pub links: Option<PathBuf>,
    pub constants: PathBuf,
    pub assignments: PathBuf,
    pub strict: bool,
    pub keep: usize,
}

impl SsotPaths {
    /// `base` is the directory of the settings file; a relative `[data] dir`
    /// is taken from there.
    pub fn from_config(config: &dyn ConfigPort, base: &Path) -> Result<Self, KsauError> {
        validate_settings(config)?;

        let dir = match config.get_string("data", "dir") {
            Some(d) => base.join(d.trim()),
            None => base.to_path_buf(),
        };
        let resolve = |key: &str, default: &str| -> PathBuf {
            let name = config
                .get_string("data", key)
                .unwrap_or_else(|| default.to_string());
            dir.join(name.trim())
        };

        let links = match config.get_string("data", "links") {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(dir.join(s.trim())),
            None => Some(dir.join(DEFAULT_LINKS)),
        };

        Ok(Self {
            knots: resolve("knots", DEFAULT_KNOTS),
            links,
            constants: resolve("constants", DEFAULT_CONSTANTS),
            assignments: resolve("assignments", DEFAULT_ASSIGNMENTS),
            strict: config.get_bool("data", "strict", false),
            keep: config.get_int("store", "keep", DEFAULT_KEEP) as usize,
        })
    }
}

pub fn log_level(config: &dyn ConfigPort) -> String {
    config
        .get_string("log", "level")
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

pub fn validate_settings(config: &dyn ConfigPort) -> Result<(), KsauError> {
    for key in ["knots", "constants", "assignments"] {
        if let Some(value) = config.get_string("data", key) {
            if value.trim().is_empty() {
                return Err(KsauError::ConfigInvalid {
                    section: "data".to_string(),
                    key: key.to_string(),
                    reason: format!("{key} must name a file"),
                });
            }
        }
    }

    if config.get_string("store", "keep").is_some() {
        let keep = config.get_int("store", "keep", -1);
        if keep < 0 {
            return Err(KsauError::ConfigInvalid {
                section: "store".to_string(),
                key: "keep".to_string(),
                reason: "keep must be a non-negative integer".to_string(),
            });
        }
    }

    if config.get_string("log", "level").is_some() {
        let level = log_level(config);
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(KsauError::ConfigInvalid {
                section: "log".to_string(),
                key: "level".to_string(),
                reason: format!("unknown level '{level}', expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn settings(ini: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(ini).unwrap()
    }

    #[test]
    fn defaults_resolve_against_base() {
        let paths = SsotPaths::from_config(&FileConfigAdapter::empty(), Path::new("/proj")).unwrap();
        assert_eq!(paths.knots, PathBuf::from("/proj/knotinfo_data_complete.csv"));
        assert_eq!(paths.links, Some(PathBuf::from("/proj/linkinfo_data_complete.csv")));
        assert_eq!(paths.constants, PathBuf::from("/proj/physical_constants.json"));
        assert_eq!(paths.assignments, PathBuf::from("/proj/topology_assignments.json"));
        assert!(!paths.strict);
        assert_eq!(paths.keep, 10);
    }

    #[test]
    fn data_dir_and_names_override() {
        let cfg = settings(
            "[data]\ndir = data\nknots = k.csv\nlinks =\nstrict = true\n[store]\nkeep = 0\n",
        );
        let paths = SsotPaths::from_config(&cfg, Path::new("/proj")).unwrap();
        assert_eq!(paths.knots, PathBuf::from("/proj/data/k.csv"));
        assert_eq!(paths.links, None);
        assert!(paths.strict);
        assert_eq!(paths.keep, 0);
    }

    #[test]
    fn absolute_dir_ignores_base() {
        let cfg = settings("[data]\ndir = /srv/tables\n");
        let paths = SsotPaths::from_config(&cfg, Path::new("/proj")).unwrap();
        assert_eq!(paths.knots, PathBuf::from("/srv/tables/knotinfo_data_complete.csv"));
    }

    #[test]
    fn empty_required_name_is_invalid() {
        let cfg = settings("[data]\nconstants =\n");
        let err = validate_settings(&cfg).unwrap_err();
        assert!(matches!(err, KsauError::ConfigInvalid { key, .. } if key == "constants"));
    }

    #[test]
    fn negative_keep_is_invalid() {
        let cfg = settings("[store]\nkeep = -3\n");
        assert!(matches!(
            validate_settings(&cfg),
            Err(KsauError::ConfigInvalid { key, .. }) if key == "keep"
        ));
        let cfg = settings("[store]\nkeep = many\n");
        assert!(validate_settings(&cfg).is_err());
    }

    #[test]
    fn log_level_is_checked() {
        assert_eq!(log_level(&FileConfigAdapter::empty()), "info");
        assert_eq!(log_level(&settings("[log]\nlevel = DEBUG\n")), "debug");
        assert!(validate_settings(&settings("[log]\nlevel = loud\n")).is_err());
    }
}
