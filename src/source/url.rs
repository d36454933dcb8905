//! URL source
//!
//! `http://` and `https://` locations are fetched with a blocking `ureq`
//! request on the blocking pool; the body is forwarded chunk by chunk
//! over a bounded channel. `file://` locations and bare paths are read
//! from the local filesystem.

use crate::cache::Digest;
use crate::source::{reader_chunks, Source, SourceStream, CHUNK_SIZE};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, StreamExt};
use std::io::{self, Read};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Chunks buffered between the blocking reader and the cache
const CHANNEL_DEPTH: usize = 8;

/// Where a URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Http(String),
    File(PathBuf),
}

impl Location {
    pub fn parse(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            Self::Http(url.to_string())
        } else if let Some(path) = url.strip_prefix("file://") {
            Self::File(PathBuf::from(path))
        } else {
            Self::File(PathBuf::from(url))
        }
    }
}

/// Fetches content from the URL given as the request argument
#[derive(Debug, Clone)]
pub struct UrlSource {
    user_agent: String,
}

impl Default for UrlSource {
    fn default() -> Self {
        Self::new(concat!("hoard/", env!("CARGO_PKG_VERSION")))
    }
}

impl UrlSource {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn open_http(&self, url: String) -> io::Result<SourceStream> {
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel::<io::Result<()>>();
        let user_agent = self.user_agent.clone();

        tokio::task::spawn_blocking(move || {
            let response = ureq::get(&url)
                .header("User-Agent", user_agent.as_str())
                .call();

            let mut reader = match response {
                Ok(response) => {
                    let _ = ready_tx.send(Ok(()));
                    response.into_body().into_reader()
                }
                Err(ureq::Error::StatusCode(status)) => {
                    let _ = ready_tx.send(Err(io::Error::other(format!(
                        "GET {} returned HTTP {}",
                        url, status
                    ))));
                    return;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(io::Error::other(format!("GET {}: {}", url, e))));
                    return;
                }
            };

            loop {
                let mut buf = BytesMut::zeroed(CHUNK_SIZE);
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.truncate(n);
                        if tx.blocking_send(Ok(buf.freeze())).is_err() {
                            debug!("Consumer of {} went away", url);
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        });

        ready_rx
            .await
            .map_err(|_| io::Error::other("HTTP fetch task ended before responding"))??;

        let body = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(body.boxed())
    }
}

#[async_trait]
impl Source for UrlSource {
    type Args = String;

    async fn open(&self, digest: &Digest, url: &String) -> io::Result<SourceStream> {
        debug!("Fetching {} from {}", digest, url);
        match Location::parse(url) {
            Location::Http(url) => self.open_http(url).await,
            Location::File(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    io::Error::new(e.kind(), format!("opening {}: {}", path.display(), e))
                })?;
                Ok(reader_chunks(file))
            }
        }
    }
}
