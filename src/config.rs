use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;

#[derive(Debug, Default)]
struct RcConfig {
    api_key: Option<String>,
    host: Option<String>,
    url: Option<String>,
}

pub(crate) fn load_config(
    api_key: Option<String>,
    host: Option<String>,
    url: Option<String>,
) -> Result<ClientConfig> {
    let explicit = RcConfig {
        api_key: api_key.or_else(|| std::env::var("TOPSY_API_KEY").ok()),
        host: host.or_else(|| std::env::var("TOPSY_HOST").ok()),
        url: url.or_else(|| std::env::var("TOPSY_URL").ok()),
    };
    resolve(explicit, &rc_candidates())
}

fn resolve(mut cfg: RcConfig, rc_candidates: &[PathBuf]) -> Result<ClientConfig> {
    if cfg.api_key.is_none() || cfg.host.is_none() || cfg.url.is_none() {
        for rc_path in rc_candidates {
            if rc_path.exists() {
                let rc = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;

                cfg.api_key = cfg.api_key.or(rc.api_key);
                cfg.host = cfg.host.or(rc.host);
                cfg.url = cfg.url.or(rc.url);
                break;
            }
        }
    }

    let api_key = match cfg.api_key.filter(|k| !k.trim().is_empty()) {
        Some(v) => v.trim().to_string(),
        None => {
            if !rc_candidates.is_empty() {
                bail!(
                    "Missing configuration: apikey (set TOPSY_API_KEY or put `apikey:` in one of: {})",
                    rc_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            bail!("Missing configuration: apikey (set TOPSY_API_KEY or create .topsyrc)");
        }
    };

    let mut out = ClientConfig::new(api_key);
    out.host = cfg.host.filter(|h| !h.trim().is_empty());
    if let Some(url) = cfg.url.filter(|u| !u.trim().is_empty()) {
        out.base_url = url;
    }
    Ok(out)
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // `key:` may sit on its own line with the value on the next one.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                cfg.set(pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                cfg.set(k, v);
            }
        }
    }

    cfg
}

impl RcConfig {
    fn set(&mut self, key: &str, value: &str) {
        let value = Some(value.to_string());
        match key {
            "apikey" | "api_key" => self.api_key = value,
            "host" => self.host = value,
            "url" => self.url = value,
            _ => {}
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) TOPSY_RC (explicit)
    // 2) ./.topsyrc
    // 3) ~/.topsyrc
    if let Ok(p) = std::env::var("TOPSY_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".topsyrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".topsyrc"));
    }
    v
}
