//! The HTTP capability each worker uses: perform one GET, stream header lines
//! and body chunks into a sink, report elapsed time or a transport failure.

use crate::config::RunConfig;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use std::io::{self, Read};
use std::time::{Duration, Instant};
use thiserror::Error;

const READ_CHUNK: usize = 16 * 1024;

/// Transport-level failure with whatever text the HTTP layer produced.
#[derive(Error, Debug)]
#[error("{detail}")]
pub struct TransferError {
    pub detail: String,
}

impl TransferError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Receives a transfer's data as it arrives, on the calling thread.
pub trait TransferSink {
    /// One header line, the status line first.
    fn header(&mut self, line: &[u8]);

    /// One body chunk. An error aborts the transfer.
    fn body(&mut self, chunk: &[u8]) -> io::Result<()>;
}

pub trait Transfer: Send + Sync {
    fn get(&self, url: &str, sink: &mut dyn TransferSink) -> Result<Duration, TransferError>;
}

/// [`Transfer`] over a blocking reqwest client.
#[derive(Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new(config: &RunConfig) -> Result<Self, TransferError> {
        // No idle pooling: every unit opens its own connection. Redirects are
        // not followed, so the status latched is the first response's. A `None`
        // timeout clears reqwest's 30s default.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(0)
            .redirect(Policy::none())
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransferError::new(format!("client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transfer for HttpTransfer {
    fn get(&self, url: &str, sink: &mut dyn TransferSink) -> Result<Duration, TransferError> {
        let started = Instant::now();
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransferError::new(e.to_string()))?;

        let status_line = format!("{:?} {}\r\n", response.version(), response.status());
        sink.header(status_line.as_bytes());
        for (name, value) in response.headers() {
            let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
            line.extend_from_slice(name.as_str().as_bytes());
            line.extend_from_slice(b": ");
            line.extend_from_slice(value.as_bytes());
            line.extend_from_slice(b"\r\n");
            sink.header(&line);
        }

        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransferError::new(format!("read failed: {}", e))),
            };
            sink.body(&buf[..n])
                .map_err(|e| TransferError::new(format!("write callback failed: {}", e)))?;
        }

        Ok(started.elapsed())
    }
}
