use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{McpConfig, load_config};

pub const STATE_DIR_NAME: &str = ".mcpsearch";
pub const DB_FILENAME: &str = "mcpsearch.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
    pub executable_dir: Option<PathBuf>,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        let executable_dir = env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));
        Ok(Self {
            cwd,
            executable_dir,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub db_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nstate_dir={}\ndb_path={} ({})\nconfig_path={} ({})",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.db_path),
            self.db_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

/// Resolved paths plus the loaded configuration.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub paths: ResolvedPaths,
    pub config: McpConfig,
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub project_root_exists: bool,
    pub state_dir_exists: bool,
    pub config_exists: bool,
    pub db_exists: bool,
    pub db_size_bytes: Option<u64>,
    pub warnings: Vec<String>,
}

pub fn resolve_runtime(context: &ResolutionContext, overrides: &PathOverrides) -> Result<Runtime> {
    resolve_runtime_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_runtime_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<Runtime>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = resolve_project_root(context, overrides, &lookup_env);
    let state_dir = project_root.join(STATE_DIR_NAME);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = non_empty_env(&lookup_env, "MCPSEARCH_CONFIG") {
        (
            absolutize(Path::new(&value), &project_root),
            ValueSource::Env,
        )
    } else {
        (state_dir.join("config.toml"), ValueSource::Default)
    };
    let config = load_config(&config_path)?;

    let (db_path, db_source) = if let Some(path) = overrides.db_path.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = non_empty_env(&lookup_env, "MCPSEARCH_DB_PATH") {
        (
            absolutize(Path::new(&value), &project_root),
            ValueSource::Env,
        )
    } else if let Some(path) = config.search.db_path.as_deref() {
        (absolutize(path, &project_root), ValueSource::Config)
    } else {
        (state_dir.join("data").join(DB_FILENAME), ValueSource::Default)
    };

    Ok(Runtime {
        paths: ResolvedPaths {
            project_root,
            state_dir,
            db_path,
            config_path,
            root_source,
            db_source,
            config_source,
        },
        config,
    })
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> Result<RuntimeStatus> {
    let project_root_exists = paths.project_root.exists();
    let state_dir_exists = paths.state_dir.exists();
    let config_exists = paths.config_path.exists();
    let db_exists = paths.db_path.exists();
    let db_size_bytes = if db_exists {
        let metadata = fs::metadata(&paths.db_path)
            .with_context(|| format!("failed to inspect {}", paths.db_path.display()))?;
        Some(metadata.len())
    } else {
        None
    };

    let mut warnings = Vec::new();
    if !db_exists {
        warnings.push(format!(
            "database is missing at {}; pass --db or set MCPSEARCH_DB_PATH",
            normalize_for_display(&paths.db_path)
        ));
    }
    if !config_exists && paths.config_source != ValueSource::Default {
        warnings.push(format!(
            "config file {} does not exist; using defaults",
            normalize_for_display(&paths.config_path)
        ));
    }

    Ok(RuntimeStatus {
        project_root_exists,
        state_dir_exists,
        config_exists,
        db_exists,
        db_size_bytes,
        warnings,
    })
}

fn resolve_project_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> (PathBuf, ValueSource)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.project_root.as_deref() {
        return (absolutize(path, &context.cwd), ValueSource::Flag);
    }

    if let Some(value) = non_empty_env(lookup_env, "MCPSEARCH_PROJECT_ROOT") {
        return (
            absolutize(Path::new(&value), &context.cwd),
            ValueSource::Env,
        );
    }

    let root = detect_project_root_heuristic(&context.cwd, context.executable_dir.as_deref());
    (root, ValueSource::Heuristic)
}

fn detect_project_root_heuristic(cwd: &Path, executable_dir: Option<&Path>) -> PathBuf {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&Path> = cwd.ancestors().collect();
    if let Some(exe_dir) = executable_dir {
        candidates.extend(exe_dir.ancestors());
    }
    for candidate in candidates {
        if !seen.insert(normalize_for_display(candidate)) {
            continue;
        }
        if candidate.join(STATE_DIR_NAME).is_dir() {
            return candidate.to_path_buf();
        }
    }
    cwd.to_path_buf()
}

fn non_empty_env<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::tempdir;

    use super::{
        DB_FILENAME, PathOverrides, ResolutionContext, STATE_DIR_NAME, ValueSource,
        inspect_runtime, resolve_runtime_with_lookup,
    };

    fn context(cwd: &std::path::Path) -> ResolutionContext {
        ResolutionContext {
            cwd: cwd.to_path_buf(),
            executable_dir: None,
        }
    }

    #[test]
    fn project_root_flag_wins_over_env() {
        let temp = tempdir().expect("tempdir");
        let cwd = temp.path().join("cwd");
        let from_flag = temp.path().join("flag-root");
        fs::create_dir_all(&cwd).expect("create cwd");

        let overrides = PathOverrides {
            project_root: Some(from_flag.clone()),
            ..PathOverrides::default()
        };
        let env = HashMap::from([(
            "MCPSEARCH_PROJECT_ROOT".to_string(),
            temp.path().join("env-root").to_string_lossy().to_string(),
        )]);

        let runtime =
            resolve_runtime_with_lookup(&context(&cwd), &overrides, |key| env.get(key).cloned())
                .expect("resolve");
        assert_eq!(runtime.paths.project_root, from_flag);
        assert_eq!(runtime.paths.root_source, ValueSource::Flag);
        assert_eq!(
            runtime.paths.db_path,
            from_flag.join(STATE_DIR_NAME).join("data").join(DB_FILENAME)
        );
        assert_eq!(runtime.paths.db_source, ValueSource::Default);
    }

    #[test]
    fn heuristic_finds_state_dir_in_ancestors() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("project");
        let nested = root.join("a").join("b");
        fs::create_dir_all(root.join(STATE_DIR_NAME)).expect("state dir");
        fs::create_dir_all(&nested).expect("nested");

        let runtime =
            resolve_runtime_with_lookup(&context(&nested), &PathOverrides::default(), |_| None)
                .expect("resolve");
        assert_eq!(runtime.paths.project_root, root);
        assert_eq!(runtime.paths.root_source, ValueSource::Heuristic);
    }

    #[test]
    fn db_path_resolution_order_is_flag_env_config_default() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("project");
        fs::create_dir_all(root.join(STATE_DIR_NAME)).expect("state dir");
        fs::write(
            root.join(STATE_DIR_NAME).join("config.toml"),
            "[search]\ndb_path = \"from-config.db\"\nbatch_lookups = true\n",
        )
        .expect("write config");
        let base = PathOverrides {
            project_root: Some(root.clone()),
            ..PathOverrides::default()
        };

        let from_config = resolve_runtime_with_lookup(&context(&root), &base, |_| None)
            .expect("resolve");
        assert_eq!(from_config.paths.db_path, root.join("from-config.db"));
        assert_eq!(from_config.paths.db_source, ValueSource::Config);
        assert!(from_config.config.search.batch_lookups);

        let env = HashMap::from([("MCPSEARCH_DB_PATH".to_string(), "from-env.db".to_string())]);
        let from_env =
            resolve_runtime_with_lookup(&context(&root), &base, |key| env.get(key).cloned())
                .expect("resolve");
        assert_eq!(from_env.paths.db_path, root.join("from-env.db"));
        assert_eq!(from_env.paths.db_source, ValueSource::Env);

        let with_flag = PathOverrides {
            db_path: Some(temp.path().join("flag.db")),
            ..base
        };
        let from_flag =
            resolve_runtime_with_lookup(&context(&root), &with_flag, |key| env.get(key).cloned())
                .expect("resolve");
        assert_eq!(from_flag.paths.db_path, temp.path().join("flag.db"));
        assert_eq!(from_flag.paths.db_source, ValueSource::Flag);
    }

    #[test]
    fn inspect_runtime_warns_about_missing_database() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("project");
        fs::create_dir_all(&root).expect("create root");
        let overrides = PathOverrides {
            project_root: Some(root.clone()),
            ..PathOverrides::default()
        };
        let runtime =
            resolve_runtime_with_lookup(&context(&root), &overrides, |_| None).expect("resolve");

        let status = inspect_runtime(&runtime.paths).expect("inspect");
        assert!(status.project_root_exists);
        assert!(!status.db_exists);
        assert!(status.db_size_bytes.is_none());
        assert_eq!(status.warnings.len(), 1);
        assert!(status.warnings[0].contains("database is missing"));
        assert!(runtime.paths.diagnostics().contains("db_path="));
    }

    #[test]
    fn broken_config_file_fails_resolution() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("project");
        fs::create_dir_all(root.join(STATE_DIR_NAME)).expect("state dir");
        fs::write(root.join(STATE_DIR_NAME).join("config.toml"), "[search").expect("write");
        let overrides = PathOverrides {
            project_root: Some(root.clone()),
            ..PathOverrides::default()
        };
        let error = resolve_runtime_with_lookup(&context(&root), &overrides, |_| None)
            .expect_err("must fail");
        assert!(format!("{error:#}").contains("failed to parse"));
    }
}
