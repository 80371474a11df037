//! A small Rust client for Topsy's Otter API.
//!
//! Every call is a single signed GET: the API key is added to the query,
//! rate-limit headers are recorded, and the `response` object of the JSON
//! envelope is returned (or a typed [`Error`]).
//!
//! ## Quick start
//! - Pass the API key to [`Client::new`], or configure it via environment
//!   variables (`TOPSY_API_KEY`, `TOPSY_HOST`) or a `.topsyrc` file and use
//!   [`Client::from_env`].
//! - Call [`Client::call`] with a resource name and its parameters.
//!
//! ```no_run
//! use topsy::Client;
//!
//! fn main() -> anyhow::Result<()> {
//!     let client = Client::new("YOUR_API_KEY", Some("example.com"))?;
//!     let author = client.call("authorinfo", [("url", "http://twitter.com/thesmart")])?;
//!     println!("{}", author["name"]);
//!     println!("calls left: {:?}", client.last_limit());
//!     Ok(())
//! }
//! ```
//!
//! Near the rate limit (below 20% of it by default) the client logs a
//! sampled `tracing` warning; the call itself is never affected.

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod rate_limit;
mod response;
mod util;

pub use client::{API_KEY_PARAM, Client, ClientConfig, OTTER_URL};
pub use error::{Error, Result, default_message};
pub use rate_limit::{
    AlwaysSample, DEFAULT_SAMPLE_RATE, DEFAULT_WARN_LEVEL, NeverSample, RandomSampler, RateLimit,
    WarnSampler,
};
pub use response::{ApiResponse, MAX_DEPTH, ResponseHeaders, split_raw};
