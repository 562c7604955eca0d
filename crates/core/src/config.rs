//! App catalog: the known set of launchable app configurations.
//!
//! Configurations live in a TOML file (`~/.launchdeck/apps.toml` by
//! default) as an ordered list of `[[apps]]` tables. Later entries override
//! earlier ones with the same id, which lets a generated defaults block be
//! shadowed by user entries appended below it. The catalog is immutable
//! between refreshes; `refresh()` atomically replaces the entire set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use launchdeck_common::paths::expand;

/// Catalog filename under the launchdeck home directory.
const CATALOG_FILENAME: &str = "apps.toml";
/// Launchdeck directory name in home.
const HOME_DIR: &str = ".launchdeck";

/// One user-defined launchable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Unique identifier, used in every start/stop/status request.
    pub id: String,
    /// Display name, used to tag forwarded process output.
    pub name: String,
    /// Working directory; `~` and `$VAR` references are expanded at load.
    pub path: PathBuf,
    /// Launch command.
    pub command: String,
    /// Ordered argument list.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables layered on top of the inherited env.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Start of the port window. `None` together with `max_port = None`
    /// means the app gets no network port (terminal/CLI launch).
    #[serde(default)]
    pub preferred_port: Option<u16>,
    /// End of the port window.
    #[serde(default)]
    pub max_port: Option<u16>,
    /// `true`: supervised background launch with browser auto-open.
    /// `false`: detached terminal launch, no lifecycle tracking.
    #[serde(default = "default_true")]
    pub auto_open_browser: bool,
    /// Free-text type tag ("vite", "uvicorn", "container", ...).
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Free-text description for listings.
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

fn default_kind() -> String {
    "custom".to_string()
}

impl AppConfig {
    /// Validate the fields the lifecycle manager relies on.
    ///
    /// Returns non-fatal warnings on success. Missing required fields are
    /// fatal; a missing directory or an odd port window is only warned
    /// about, matching how a half-configured entry should still be listed.
    pub fn validate(&self) -> Result<Vec<String>> {
        for (field, value) in [
            ("id", self.id.trim()),
            ("name", self.name.trim()),
            ("command", self.command.trim()),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidConfig {
                    id: self.id.clone(),
                    reason: format!("missing required field '{field}'"),
                });
            }
        }
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                id: self.id.clone(),
                reason: "missing required field 'path'".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if !self.path.exists() {
            warnings.push(format!("directory does not exist: {}", self.path.display()));
        }
        if let (Some(preferred), Some(max)) = (self.preferred_port, self.max_port) {
            if preferred < 1024 {
                warnings.push(format!(
                    "preferred port {preferred} is outside the unprivileged range (1024-65535)"
                ));
            }
            if max < preferred {
                warnings.push(format!(
                    "max port {max} is less than preferred port {preferred}"
                ));
            }
        }
        Ok(warnings)
    }

    /// Whether this app participates in port allocation at all.
    pub fn has_port_window(&self) -> bool {
        self.preferred_port.is_some() && self.max_port.is_some()
    }
}

/// Validation report for one app, as returned by `GET /api/config/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: String,
    pub name: String,
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// On-disk catalog file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CatalogFile {
    #[serde(default)]
    apps: Vec<AppConfig>,
}

/// The loaded app set. Shared read-mostly; `refresh()` swaps the
/// whole map atomically so readers never observe a partial reload.
#[derive(Debug)]
pub struct AppCatalog {
    path: Option<PathBuf>,
    apps: RwLock<Arc<BTreeMap<String, Arc<AppConfig>>>>,
}

impl AppCatalog {
    /// Path to the default catalog file (`~/.launchdeck/apps.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| Error::CatalogLoad {
            path: "~".to_string(),
            reason: "failed to determine home directory".to_string(),
        })?;
        Ok(home.join(HOME_DIR).join(CATALOG_FILENAME))
    }

    /// Load the catalog from a TOML file. A missing file is an empty
    /// catalog, not an error, so a fresh install can start the server and
    /// add apps afterwards.
    pub fn load(path: &Path) -> Result<Self> {
        let apps = Self::read_file(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            apps: RwLock::new(Arc::new(apps)),
        })
    }

    /// Build a catalog directly from configs (used by tests and embedders).
    pub fn from_apps(apps: Vec<AppConfig>) -> Self {
        Self {
            path: None,
            apps: RwLock::new(Arc::new(Self::merge(apps))),
        }
    }

    /// Re-read the catalog file and atomically replace the known set.
    pub fn refresh(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            // In-memory catalogs have nothing to re-read.
            return Ok(self.len());
        };
        let apps = Self::read_file(path)?;
        let count = apps.len();
        let mut guard = self.apps.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(apps);
        Ok(count)
    }

    /// Look up one app by id.
    pub fn get(&self, id: &str) -> Option<Arc<AppConfig>> {
        self.snapshot().get(id).cloned()
    }

    /// All apps, ordered by id.
    pub fn all(&self) -> Vec<Arc<AppConfig>> {
        self.snapshot().values().cloned().collect()
    }

    /// Number of configured apps.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Validate every app, collecting per-app reports.
    pub fn validate_all(&self) -> Vec<ValidationReport> {
        self.all()
            .iter()
            .map(|app| match app.validate() {
                Ok(warnings) => ValidationReport {
                    id: app.id.clone(),
                    name: app.name.clone(),
                    valid: true,
                    errors: Vec::new(),
                    warnings,
                },
                Err(err) => ValidationReport {
                    id: app.id.clone(),
                    name: app.name.clone(),
                    valid: false,
                    errors: vec![err.to_string()],
                    warnings: Vec::new(),
                },
            })
            .collect()
    }

    fn snapshot(&self) -> Arc<BTreeMap<String, Arc<AppConfig>>> {
        Arc::clone(&self.apps.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, Arc<AppConfig>>> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "App catalog file not found, starting empty.");
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|err| Error::CatalogLoad {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let file: CatalogFile = toml::from_str(&contents).map_err(|err| Error::CatalogLoad {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::merge(file.apps))
    }

    /// Merge an ordered app list into a map; later entries override earlier
    /// ones with the same id. Entries missing required fields are kept so
    /// the validation report can surface them; the manager rejects them at
    /// start time instead.
    fn merge(apps: Vec<AppConfig>) -> BTreeMap<String, Arc<AppConfig>> {
        let mut merged = BTreeMap::new();
        for mut app in apps {
            app.path = expand(&app.path.display().to_string());
            if let Err(err) = app.validate() {
                tracing::warn!(app = %app.id, error = %err, "App configuration is invalid; it will not start.");
            }
            merged.insert(app.id.clone(), Arc::new(app));
        }
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_app(id: &str, dir: &Path) -> AppConfig {
        AppConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            path: dir.to_path_buf(),
            command: "npm".to_string(),
            args: vec!["run".to_string(), "dev".to_string()],
            env: BTreeMap::new(),
            preferred_port: Some(3000),
            max_port: Some(3010),
            auto_open_browser: true,
            kind: "vite".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_load_catalog_from_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("apps.toml");
        std::fs::write(
            &path,
            r#"
[[apps]]
id = "web"
name = "Web Frontend"
path = "/opt/apps/web"
command = "npm"
args = ["run", "dev"]
preferred_port = 3000
max_port = 3010
kind = "vite"

[[apps]]
id = "worker"
name = "Worker"
path = "/opt/apps/worker"
command = "cargo"
args = ["run"]
auto_open_browser = false
"#,
        )
        .unwrap();

        let catalog = AppCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);

        let web = catalog.get("web").unwrap();
        assert_eq!(web.preferred_port, Some(3000));
        assert!(web.auto_open_browser);
        assert_eq!(web.kind, "vite");

        let worker = catalog.get("worker").unwrap();
        assert!(!worker.auto_open_browser);
        assert!(!worker.has_port_window());
        assert_eq!(worker.kind, "custom");
    }

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let temp = TempDir::new().unwrap();
        let catalog = AppCatalog::load(&temp.path().join("nope.toml")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_later_entries_override_earlier_by_id() {
        let temp = TempDir::new().unwrap();
        let mut first = sample_app("web", temp.path());
        first.preferred_port = Some(3000);
        let mut second = sample_app("web", temp.path());
        second.preferred_port = Some(4000);

        let catalog = AppCatalog::from_apps(vec![first, second]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("web").unwrap().preferred_port, Some(4000));
    }

    #[test]
    fn test_invalid_entries_are_kept_and_reported() {
        let temp = TempDir::new().unwrap();
        let mut bad = sample_app("bad", temp.path());
        bad.command = String::new();

        let catalog = AppCatalog::from_apps(vec![sample_app("good", temp.path()), bad]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("bad").is_some());

        let reports = catalog.validate_all();
        let bad_report = reports.iter().find(|r| r.id == "bad").unwrap();
        assert!(!bad_report.valid);
        assert!(bad_report.errors.iter().any(|e| e.contains("command")));
        let good_report = reports.iter().find(|r| r.id == "good").unwrap();
        assert!(good_report.valid);
    }

    #[test]
    fn test_validate_missing_field_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut app = sample_app("web", temp.path());
        app.name = String::new();
        let err = app.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_port_window_warnings() {
        let temp = TempDir::new().unwrap();
        let mut app = sample_app("web", temp.path());
        app.preferred_port = Some(8080);
        app.max_port = Some(8000);
        let warnings = app.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("less than preferred")));
    }

    #[test]
    fn test_validate_missing_directory_warns() {
        let temp = TempDir::new().unwrap();
        let app = sample_app("web", &temp.path().join("gone"));
        let warnings = app.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn test_refresh_replaces_whole_set() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("apps.toml");
        std::fs::write(
            &path,
            "[[apps]]\nid = \"a\"\nname = \"A\"\npath = \"/tmp\"\ncommand = \"true\"\n",
        )
        .unwrap();
        let catalog = AppCatalog::load(&path).unwrap();
        assert!(catalog.get("a").is_some());

        std::fs::write(
            &path,
            "[[apps]]\nid = \"b\"\nname = \"B\"\npath = \"/tmp\"\ncommand = \"true\"\n",
        )
        .unwrap();
        assert_eq!(catalog.refresh().unwrap(), 1);
        assert!(catalog.get("a").is_none());
        assert!(catalog.get("b").is_some());
    }
}
