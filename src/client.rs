use reqwest::blocking::Client as HttpClient;
use reqwest::header::{EXPECT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::config::load_config;
use crate::error::{CODE_FAILED_INIT, Error, Result};
use crate::rate_limit::{DEFAULT_WARN_LEVEL, RandomSampler, RateLimit, WarnSampler};
use crate::response::{ApiResponse, ResponseHeaders, decode_envelope, split_raw};
use crate::util::{build_query, resource_url};

/// The Otter API endpoint.
pub const OTTER_URL: &str = "http://otter.topsy.com/";

/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "apikey";

const BASE_USER_AGENT: &str = concat!("topsy-client-", env!("CARGO_PKG_VERSION"));

/// Settings a [`Client`] is built from.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key, sent with every call.
    pub api_key: String,
    /// Your application's host or domain name.
    ///
    /// When set it is prepended to the user-agent.
    pub host: Option<String>,
    /// Base API URL, [`OTTER_URL`] unless overridden.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: None,
            base_url: OTTER_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Blocking client for the Otter API.
///
/// Each [`call`](Client::call) is independent apart from the last observed
/// rate limit, which is kept behind a mutex so a client can be shared
/// between threads.
#[derive(Debug)]
pub struct Client {
    api_key: String,
    base_url: String,
    user_agent: String,

    warn_level: f64,
    sampler: Box<dyn WarnSampler>,
    last_limit: Mutex<Option<RateLimit>>,

    http: HttpClient,
}

impl Client {
    /// Creates a client with the default endpoint and timeouts.
    ///
    /// An empty `host` is the same as none.
    pub fn new(api_key: impl Into<String>, host: Option<&str>) -> Result<Self> {
        let mut cfg = ClientConfig::new(api_key);
        cfg.host = host.map(str::to_string);
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: ClientConfig) -> Result<Self> {
        let user_agent = user_agent(cfg.host.as_deref());

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).map_err(|e| {
                Error::transport(CODE_FAILED_INIT, format!("invalid user agent: {}", e))
            })?,
        );
        // An empty Expect suppresses the 100-continue handshake.
        default_headers.insert(EXPECT, HeaderValue::from_static(""));

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| {
                Error::transport(CODE_FAILED_INIT, format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: cfg.api_key,
            base_url: cfg.base_url,
            user_agent,
            warn_level: DEFAULT_WARN_LEVEL,
            sampler: Box::new(RandomSampler::default()),
            last_limit: Mutex::new(None),
            http,
        })
    }

    /// Creates a client from environment variables and/or `.topsyrc`.
    ///
    /// This is equivalent to `Client::from_sources(None, None, None)`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_sources(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `api_key`/`host`/`url` arguments
    /// - environment variables `TOPSY_API_KEY` / `TOPSY_HOST` / `TOPSY_URL`
    /// - config file from `TOPSY_RC` or `.topsyrc`
    pub fn from_sources(
        api_key: Option<String>,
        host: Option<String>,
        url: Option<String>,
    ) -> anyhow::Result<Self> {
        let cfg = load_config(api_key, host, url)?;
        Ok(Self::with_config(cfg)?)
    }

    /// Fraction of the limit below which calls count as near the limit.
    pub fn with_warn_level(mut self, warn_level: f64) -> Self {
        self.warn_level = warn_level;
        self
    }

    /// Sets the policy deciding which near-limit calls get logged.
    pub fn with_sampler(mut self, sampler: impl WarnSampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    /// The `User-Agent` sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Calls `resource` and returns the `response` object of the reply.
    ///
    /// The API key is added to `params`; a caller-supplied `apikey` is
    /// overwritten.
    pub fn call<I, K, V>(&self, resource: &str, params: I) -> Result<ApiResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let resource = resource.trim();
        if resource.is_empty() {
            return Err(Error::InvalidResource {
                resource: resource.to_string(),
            });
        }

        let mut params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .filter(|(k, _)| k != API_KEY_PARAM)
            .collect();
        params.push((API_KEY_PARAM.to_string(), self.api_key.clone()));

        let url = resource_url(&self.base_url, resource, &build_query(params));
        tracing::debug!(resource, "calling Otter API");

        let resp = self.http.get(&url).send().map_err(Error::from_reqwest)?;
        let status = resp.status();
        let headers = ResponseHeaders::from_header_map(resp.headers());
        tracing::debug!(resource, status = status.as_u16(), "Otter API responded");

        self.observe_rate_limit(&headers);

        let body = resp.text().map_err(Error::from_reqwest)?;
        decode_envelope(&body)
    }

    /// Like [`call`](Client::call), then deserializes the payload into `T`.
    pub fn call_into<T, I, K, V>(&self, resource: &str, params: I) -> Result<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let payload = self.call(resource, params)?;
        serde_json::from_value(payload.into()).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Handles a raw HTTP response (headers, blank line, body) the same way
    /// [`call`](Client::call) handles a live one.
    pub fn handle_raw(&self, raw: &str) -> Result<ApiResponse> {
        let (head, body) = split_raw(raw);
        let headers = ResponseHeaders::parse(head);
        self.observe_rate_limit(&headers);
        decode_envelope(body)
    }

    /// Last remaining-calls count seen, `None` until a response carried
    /// rate-limit headers.
    pub fn last_limit(&self) -> Option<i64> {
        self.last_rate_limit().map(|rl| rl.remaining)
    }

    pub fn last_rate_limit(&self) -> Option<RateLimit> {
        *self
            .last_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the rate limit, if any, and logs a sampled warning when close
    /// to it. Returns whether the call was near the limit.
    fn observe_rate_limit(&self, headers: &ResponseHeaders) -> bool {
        let Some(rl) = RateLimit::from_headers(headers) else {
            return false;
        };

        *self
            .last_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(rl);

        if !rl.is_near_limit(self.warn_level) {
            return false;
        }
        if self.sampler.sample() {
            tracing::warn!(
                limit = rl.limit,
                remaining = rl.remaining,
                "approaching rate limit of {}, {} calls remaining",
                rl.limit,
                rl.remaining
            );
        }
        true
    }
}

fn user_agent(host: Option<&str>) -> String {
    match host {
        Some(h) if !h.trim().is_empty() => format!("{} {}", h, BASE_USER_AGENT),
        _ => BASE_USER_AGENT.to_string(),
    }
}
