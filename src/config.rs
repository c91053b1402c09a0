use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub config: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source: SourceMeta,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Per-field fallback selector overrides for the CSS-heuristic
    /// extractor, keyed by field name (container/title/date/location/
    /// description/price/link/image).
    #[serde(default)]
    pub selectors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub site: SiteRules,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source.key.trim().is_empty() {
            bail!("source.key must not be empty");
        }
        if self.source.name.trim().is_empty() {
            bail!("source.name must not be empty");
        }

        if self.feed.enabled {
            if self.feed.url.is_none() && self.fetch.mode == FetchMode::Http {
                bail!("feed.url is required when feed.enabled is set for an http source");
            }
        } else {
            match self.fetch.mode {
                FetchMode::Http => {
                    if self.fetch.url.is_none() {
                        bail!("fetch.url is required for http mode");
                    }
                }
                FetchMode::File => {
                    if self.fetch.file_path.is_none() {
                        bail!("fetch.file_path is required for file mode");
                    }
                }
                FetchMode::Inline => {
                    if self.fetch.inline_data.is_none() {
                        bail!("fetch.inline_data is required for inline mode");
                    }
                }
            }
        }

        for rule in &self.site.events {
            if rule.title.trim().is_empty() {
                bail!("site.events entries must declare a title phrase");
            }
            if rule.date.trim().is_empty() {
                bail!(
                    "site.events entry {:?} must carry a hand-verified date",
                    rule.title
                );
            }
        }

        Ok(())
    }

    /// The URL the pipeline reports candidates under, regardless of
    /// fetch mode.
    pub fn page_url(&self) -> String {
        if self.feed.enabled
            && let Some(url) = &self.feed.url
        {
            return url.clone();
        }
        if let Some(url) = &self.fetch.url {
            return url.clone();
        }
        if let Some(path) = &self.fetch.file_path {
            return format!("file://{}", path.display());
        }
        format!("inline://{}", self.source.key)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceMeta {
    pub key: String,
    pub name: String,
    /// Domain fragment used to match site-specific rules, e.g.
    /// "townhall.example.org".
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// IANA timezone used to resolve "today"/"tomorrow" on this site's
    /// pages; UTC when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Http,
    File,
    Inline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub inline_data: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Pins one identification header instead of rotating the pool.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Http,
            url: None,
            file_path: None,
            inline_data: None,
            headers: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: None,
        }
    }
}

/// Hand-verified events for a partner domain. Matching both the title
/// phrase and the date phrase against the page text is what admits the
/// rule, so a redesigned page stops matching instead of yielding stale
/// data.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteRules {
    #[serde(default)]
    pub events: Vec<KnownEventRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnownEventRule {
    pub title: String,
    pub date_phrase: String,
    /// ISO date, verified by hand when the rule was written.
    pub date: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
}

pub fn load_sources_from_dir(config_dir: &Path) -> Result<Vec<LoadedSource>> {
    if !config_dir.exists() {
        bail!("config dir does not exist: {}", config_dir.display());
    }

    let mut loaded = Vec::new();
    for entry in WalkDir::new(config_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        loaded.push(load_source_file(path)?);
    }

    loaded.sort_by(|a, b| a.config.source.key.cmp(&b.config.source.key));
    Ok(loaded)
}

pub fn load_source_file(config_path: &Path) -> Result<LoadedSource> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read source config: {}", config_path.display()))?;
    let config: SourceConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", config_path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid source config {}", config_path.display()))?;
    Ok(LoadedSource {
        path: config_path.to_path_buf(),
        config,
    })
}

pub fn resolve_path(base_config_path: &Path, maybe_relative: &Path) -> Result<PathBuf> {
    if maybe_relative.is_absolute() {
        return Ok(maybe_relative.to_path_buf());
    }

    let parent = base_config_path.parent().ok_or_else(|| {
        anyhow::anyhow!(
            "source config has no parent directory: {}",
            base_config_path.display()
        )
    })?;

    Ok(parent.join(maybe_relative))
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u8 {
    3
}
