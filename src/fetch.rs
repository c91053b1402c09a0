use crate::config::{FetchConfig, FetchMode, LoadedSource, resolve_path};
use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identification headers rotated across attempts so a uniform block on
/// one signature does not take out every retry.
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
];

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Retrieves the document a source points at. A source that cannot be
/// fetched yields `None`, never an error: callers treat that as zero
/// candidates so one dead site cannot abort a multi-source run.
pub fn fetch_source_page(source: &LoadedSource) -> Option<FetchedPage> {
    match source.config.fetch.mode {
        FetchMode::Http => {
            let url = source.config.page_url();
            fetch_page(&source.config.fetch, &url).map(|html| FetchedPage { url, html })
        }
        FetchMode::File => fetch_file_page(source),
        FetchMode::Inline => fetch_inline_page(source),
    }
}

/// HTTP fetch with retries, rotating identification headers and a
/// randomized, attempt-scaled politeness sleep between tries.
pub fn fetch_page(cfg: &FetchConfig, url: &str) -> Option<String> {
    let attempts = cfg.max_retries.max(1);
    let mut agent = pick_agent(None);

    for attempt in 1..=attempts {
        match attempt_fetch(cfg, url, agent) {
            Ok(body) => {
                info!(%url, attempt, bytes = body.len(), "page fetched");
                return Some(body);
            }
            Err(FetchFailure::Blocked(status)) => {
                // 403 means this signature is burned; rotate before the
                // next attempt.
                warn!(%url, %status, attempt, "request blocked; rotating identification header");
                agent = pick_agent(Some(agent));
            }
            Err(FetchFailure::Status(status)) => {
                warn!(%url, %status, attempt, "request failed; retrying");
            }
            Err(FetchFailure::Transport(err)) => {
                warn!(%url, attempt, error = %err, "request errored; retrying");
            }
        }

        if attempt < attempts {
            std::thread::sleep(backoff_interval(attempt));
        }
    }

    warn!(%url, attempts, "giving up after retries; treating as zero candidates");
    None
}

enum FetchFailure {
    Blocked(StatusCode),
    Status(StatusCode),
    Transport(anyhow::Error),
}

fn attempt_fetch(cfg: &FetchConfig, url: &str, agent: &'static str) -> Result<String, FetchFailure> {
    let client = build_client(cfg, agent).map_err(FetchFailure::Transport)?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| FetchFailure::Transport(err.into()))?;

    let status = response.status();
    if status == StatusCode::FORBIDDEN {
        return Err(FetchFailure::Blocked(status));
    }
    if !status.is_success() {
        return Err(FetchFailure::Status(status));
    }

    response
        .text()
        .map_err(|err| FetchFailure::Transport(err.into()))
}

fn build_client(cfg: &FetchConfig, agent: &'static str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (k, v) in &cfg.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    let user_agent = cfg.user_agent.as_deref().unwrap_or(agent);
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);

    Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .default_headers(headers)
        .build()
        .context("failed to build reqwest client")
}

fn pick_agent(avoid: Option<&'static str>) -> &'static str {
    let mut rng = rand::rng();
    for _ in 0..8 {
        if let Some(choice) = USER_AGENT_POOL.choose(&mut rng)
            && Some(*choice) != avoid
        {
            return choice;
        }
    }
    USER_AGENT_POOL[0]
}

/// 1-3s base, scaled by attempt number, capped at 5s.
fn backoff_interval(attempt: u8) -> Duration {
    let mut rng = rand::rng();
    let base_ms: u64 = rng.random_range(1_000..=3_000);
    Duration::from_millis((base_ms * attempt as u64).min(5_000))
}

fn fetch_file_page(source: &LoadedSource) -> Option<FetchedPage> {
    let Some(file_path) = source.config.fetch.file_path.as_ref() else {
        warn!(source = %source.config.source.key, "fetch.file_path missing for file mode");
        return None;
    };

    let resolved = match resolve_path(&source.path, file_path) {
        Ok(path) => path,
        Err(err) => {
            warn!(source = %source.config.source.key, error = %err, "failed to resolve file source");
            return None;
        }
    };

    match std::fs::read_to_string(&resolved) {
        Ok(html) => {
            info!(
                source = %source.config.source.key,
                file = %resolved.display(),
                bytes = html.len(),
                "loaded file source"
            );
            Some(FetchedPage {
                url: format!("file://{}", resolved.display()),
                html,
            })
        }
        Err(err) => {
            warn!(
                source = %source.config.source.key,
                file = %resolved.display(),
                error = %err,
                "failed to read file source"
            );
            None
        }
    }
}

fn fetch_inline_page(source: &LoadedSource) -> Option<FetchedPage> {
    let Some(inline) = source.config.fetch.inline_data.as_ref() else {
        warn!(source = %source.config.source.key, "fetch.inline_data missing for inline mode");
        return None;
    };

    debug!(
        source = %source.config.source.key,
        bytes = inline.len(),
        "loaded inline source"
    );

    Some(FetchedPage {
        url: format!("inline://{}", source.config.source.key),
        html: inline.clone(),
    })
}
