//! HTTP retrieval of the realtime feed with `Last-Modified` change detection.

mod basic;
mod client;
mod tracker;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use tracker::LastModifiedTracker;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use reqwest::{Method, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::error::UpstreamError;

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A payload we have not processed yet. Pass `last_modified` to
    /// [`FeedFetcher::commit`] once the payload has been handled.
    Changed {
        body: Bytes,
        last_modified: Option<DateTime<Utc>>,
    },
    /// The server reports nothing newer than what we already accepted.
    Unchanged { last_modified: DateTime<Utc> },
}

/// Polls one feed URL and tracks the newest `Last-Modified` it has accepted.
pub struct FeedFetcher<C> {
    client: C,
    url: Url,
    tracker: LastModifiedTracker,
}

impl<C: HttpClient> FeedFetcher<C> {
    pub fn new(client: C, url: Url) -> Self {
        Self {
            client,
            url,
            tracker: LastModifiedTracker::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Time of the last accepted payload, if the server sends `Last-Modified`.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.tracker.last_updated()
    }

    /// Issues one GET against the feed.
    ///
    /// Fetching never moves the stored last-updated time. A `Changed` payload
    /// is offered again on the next fetch until it is committed.
    ///
    /// # Errors
    ///
    /// [`UpstreamError::Status`] for any non-200 status, carrying the response
    /// body; [`UpstreamError::Http`] for transport failures and timeouts.
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&mut self) -> Result<FetchOutcome, UpstreamError> {
        let req = reqwest::Request::new(Method::GET, self.url.clone());
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        debug!(%status, "Received feed response");

        if status != StatusCode::OK {
            let body = error_body(resp).await;
            warn!(%status, body = %body, "Feed responded with an error");
            return Err(UpstreamError::Status { status, body });
        }

        let last_modified = parse_last_modified(resp.headers());
        if let Some(last_modified) = last_modified {
            if !self.tracker.is_newer(last_modified) {
                info!(
                    %last_modified,
                    last_updated = ?self.tracker.last_updated(),
                    "Feed has not been updated"
                );
                return Ok(FetchOutcome::Unchanged { last_modified });
            }
        }

        let body = resp.bytes().await?;
        debug!(bytes = body.len(), "Feed body received");

        Ok(FetchOutcome::Changed {
            body,
            last_modified,
        })
    }

    /// Records a `Changed` payload as processed. Older times are ignored.
    pub fn commit(&mut self, last_modified: Option<DateTime<Utc>>) {
        if let Some(last_modified) = last_modified {
            self.tracker.advance(last_modified);
        }
    }
}

/// Fetches a URL once, without change detection.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: Url) -> Result<Bytes, UpstreamError> {
    let req = reqwest::Request::new(Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if status != StatusCode::OK {
        let body = error_body(resp).await;
        return Err(UpstreamError::Status { status, body });
    }
    Ok(resp.bytes().await?)
}

/// Reads an error response body. A body that cannot be read is replaced by
/// the read error so the diagnostic is not lost.
async fn error_body(resp: reqwest::Response) -> String {
    resp.text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

/// Parses `Last-Modified` as an RFC 1123 date. Unparsable values count as
/// absent.
fn parse_last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(LAST_MODIFIED)?;
    let parsed = raw
        .to_str()
        .ok()
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok());

    match parsed {
        Some(date) => Some(date.with_timezone(&Utc)),
        None => {
            warn!(raw = ?raw, "Ignoring unparsable Last-Modified header");
            None
        }
    }
}
