//! The `HTTP` round-trip probe.
//!
//! Each check sends a `HEAD` request over a fresh connection and expects a
//! `200 OK` in reply.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::outcome::{DownReason, Outcome, ProbeId};
use crate::probe::{Probe, ProbeBuilder};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Why a request did not produce a response.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RequestError {
    /// No response within the allowed time.
    Timeout,
    /// The server refused the connection.
    Refused,
    /// The server could not be connected to.
    Unreachable,
    /// The request failed after connecting, or could not be sent at all.
    Other(String),
}

impl From<&reqwest::Error> for RequestError {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            match io_error_kind(err) {
                Some(io::ErrorKind::ConnectionRefused) => Self::Refused,
                Some(io::ErrorKind::TimedOut) => Self::Timeout,
                _ => Self::Unreachable,
            }
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// The innermost io error kind behind a request failure, if any.
fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    std::iter::successors(StdError::source(err), |&err| err.source())
        .find_map(|err| err.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

/// Sends a `HEAD` request and returns the response status code.
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient {
    fn head(&self, url: &Url, timeout: Duration) -> std::result::Result<u16, RequestError>;
}

impl HttpClient for Client {
    fn head(&self, url: &Url, timeout: Duration) -> std::result::Result<u16, RequestError> {
        let response = Self::head(self, url.clone())
            .timeout(timeout)
            .send()
            .map_err(|err| RequestError::from(&err))?;
        Ok(response.status().as_u16())
    }
}

/// Builds an [`HttpProbe`].
#[derive(Debug, Clone)]
pub struct HttpProbeBuilder {
    config: HttpConfig,
}

impl HttpProbeBuilder {
    #[must_use]
    pub const fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

impl ProbeBuilder for HttpProbeBuilder {
    type Probe = HttpProbe<Client>;

    fn id(&self) -> ProbeId {
        ProbeId::new("http", &self.config.url)
    }

    fn build(self) -> Result<HttpProbe<Client>> {
        let url = Url::parse(&self.config.url)
            .map_err(|err| Error::BadConfig(format!("http url {}: {err}", self.config.url)))?;
        // a fresh connection per check, never via a proxy
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|err| Error::Other(format!("failed to create http client: {err}")))?;
        debug!(%url, "created http client");
        Ok(HttpProbe::new(client, url))
    }
}

/// Checks that a web server answers a `HEAD` request with `200 OK`.
#[derive(Debug)]
pub struct HttpProbe<C> {
    client: C,
    url: Url,
}

impl<C: HttpClient> HttpProbe<C> {
    #[must_use]
    pub const fn new(client: C, url: Url) -> Self {
        Self { client, url }
    }
}

impl<C: HttpClient> Probe for HttpProbe<C> {
    #[instrument(skip_all, level = "debug")]
    fn check(&mut self, deadline: Instant) -> Result<Outcome> {
        let start = Instant::now();
        let remaining = deadline.saturating_duration_since(start);
        if remaining.is_zero() {
            return Ok(Outcome::Down(DownReason::Timeout));
        }
        match self.client.head(&self.url, remaining) {
            Ok(status) if status == StatusCode::OK.as_u16() => Ok(Outcome::Ok(start.elapsed())),
            Ok(status) => {
                debug!(status, "unexpected status");
                Ok(Outcome::Down(DownReason::Status(status)))
            }
            Err(RequestError::Timeout) => Ok(Outcome::Down(DownReason::Timeout)),
            Err(RequestError::Refused) => Ok(Outcome::Down(DownReason::Refused)),
            Err(RequestError::Unreachable) => Ok(Outcome::Down(DownReason::Unreachable)),
            Err(RequestError::Other(err)) => Err(Error::Http(err)),
        }
    }
}
