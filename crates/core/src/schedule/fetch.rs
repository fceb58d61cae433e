use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE},
};

use crate::error::ScheduleError;

/// Source of raw schedule pages.
pub trait Fetcher: Send + Sync {
    /// Retrieve the body at `url`.
    fn fetch(&self, url: &str) -> Result<String, ScheduleError>;
}

/// Blocking HTTP fetcher that presents itself like a desktop browser.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with a request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, ScheduleError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ScheduleError::Fetch {
                url: url.to_string(),
                reason: describe(&err),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(|err| ScheduleError::Fetch {
            url: url.to_string(),
            reason: describe(&err),
        })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    }
}
