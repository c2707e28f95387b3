use crate::model::{validate_page_config, PageConfig};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PAGE_FILE: &str = "aigen-page.yaml";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/admin/ai/generate/";

/// Runtime settings, read from `AIGEN_*` environment variables.
#[derive(Clone, Debug)]
pub struct Settings {
    pub endpoint: String,
    pub csrf_cookie: String,
    pub csrf_header: String,
    pub csrf_input: String,
    pub status_hide_after: Duration,
    // Replaces the page's cookie string when set
    pub cookie: Option<String>,
    // `AIGEN_LOG`, tracing EnvFilter directives
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            csrf_input: crate::dom::page::CSRF_INPUT_NAME.to_string(),
            status_hide_after: crate::aigen_core::status::DEFAULT_HIDE_AFTER,
            cookie: None,
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Settings::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty("AIGEN_ENDPOINT").unwrap_or(d.endpoint),
            csrf_cookie: non_empty("AIGEN_CSRF_COOKIE").unwrap_or(d.csrf_cookie),
            csrf_header: non_empty("AIGEN_CSRF_HEADER").unwrap_or(d.csrf_header),
            csrf_input: non_empty("AIGEN_CSRF_INPUT").unwrap_or(d.csrf_input),
            status_hide_after: non_empty("AIGEN_STATUS_HIDE_MS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(d.status_hide_after),
            cookie: get("AIGEN_COOKIE"),
            log_filter: non_empty("AIGEN_LOG")
                .map(|s| s.trim().to_string())
                .unwrap_or(d.log_filter),
        }
    }
}

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// Where the page description lives: `$AIGEN_CONFIG_DIR/aigen-page.yaml`, else the
/// first of `CWD/aigen-page.yaml`, `CWD/.tui/aigen-page.yaml`, `<ancestor>/.tui/aigen-page.yaml`.
pub fn discover_page(cwd: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = config_dir {
        return Some(dir.join(PAGE_FILE));
    }
    let candidates = [cwd.join(PAGE_FILE), cwd.join(".tui").join(PAGE_FILE)];
    if let Some(p) = candidates.iter().find(|p| p.exists()) {
        return Some(p.clone());
    }
    let mut cur = cwd;
    while let Some(parent) = cur.parent() {
        let p = parent.join(".tui").join(PAGE_FILE);
        if p.exists() {
            return Some(p);
        }
        cur = parent;
    }
    None
}

pub fn load_page_from(path: &Path) -> Result<PageConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let cfg: PageConfig = serde_yaml::from_str(&s).map_err(|e| match e.location() {
        Some(loc) => anyhow!("{}:{}:{}: {}", path.display(), loc.line(), loc.column(), e),
        None => anyhow!("{}: {}", path.display(), e),
    })?;
    validate_page_config(&cfg).map_err(|e| anyhow!("{}: {}", path.display(), e))?;
    Ok(cfg)
}

pub fn load_page() -> Result<(PageConfig, PathBuf)> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_dir = std::env::var("AIGEN_CONFIG_DIR").ok().map(PathBuf::from);
    let path = discover_page(&cwd, config_dir.as_deref()).ok_or_else(|| {
        anyhow!(
            "No page found. Set AIGEN_CONFIG_DIR=<dir with {PAGE_FILE}> or place {PAGE_FILE} in CWD, CWD/.tui or an ancestor's .tui"
        )
    })?;
    let cfg = load_page_from(&path)?;
    Ok((cfg, path))
}
