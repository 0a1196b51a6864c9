//! Cursor pagination over provider time-series endpoints
//!
//! A page is requested at `cursor`. On success its rows are appended and the
//! cursor moves just past the last returned timestamp. Paging stops on a
//! short page, an empty page, or once the cursor passes the range end.
//! Time-chunked endpoints step over empty chunks instead of stopping.
//! Rate-limited and transport-failed pages are retried in place, never
//! advancing the cursor, until the retry budget is spent.

use common::ProviderKind;
use observability::PipelineMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pacing::{cancellable_sleep, RequestLimiter, RetryPolicy};
use crate::transport::{HttpClient, HttpRequest, HttpResponse};
use crate::{MarketDataError, Result};

/// Parsed body of a successful (2xx) response
#[derive(Debug)]
pub enum PageBody<T> {
    Rows(Vec<T>),
    /// Rate limit reported inside an otherwise successful response
    RateLimited,
}

/// One paginated endpoint of a provider
pub trait PagedEndpoint: Send + Sync {
    type Row: Send;

    /// Short name for logs ("klines", "fundingRate", ...)
    fn name(&self) -> &'static str;

    /// Request for the page starting at `cursor` (unix ms); `end` is the
    /// last millisecond of the range
    fn request(&self, cursor: i64, end: i64) -> HttpRequest;

    fn parse(&self, body: &str) -> Result<PageBody<Self::Row>>;

    /// Timestamp of a row in unix ms
    fn row_time(&self, row: &Self::Row) -> i64;

    /// Rows per full page; `None` disables the short-page rule
    fn page_limit(&self) -> Option<usize>;

    /// Cursor for the page after one that started at `cursor` and whose last
    /// row is at `last_row_time`
    fn next_cursor(&self, cursor: i64, last_row_time: i64) -> i64;

    /// Cursor to continue from after an empty page at `cursor`; `None` stops
    fn empty_page_cursor(&self, _cursor: i64) -> Option<i64> {
        None
    }

    fn is_rate_limit_status(&self, status: u16) -> bool {
        status == 429
    }
}

/// Shared pieces every fetch needs
#[derive(Clone)]
pub struct FetchContext {
    pub provider: ProviderKind,
    pub http: Arc<dyn HttpClient>,
    pub limiter: Arc<RequestLimiter>,
    pub retry: RetryPolicy,
    /// Politeness delay between successful pages
    pub page_delay: Duration,
    pub cancel: CancellationToken,
    pub metrics: PipelineMetrics,
}

enum Retry {
    RateLimited,
    Transient(String),
}

impl FetchContext {
    /// Fetch every page of `endpoint` between `start` and `end` (unix ms,
    /// inclusive)
    pub async fn paginate<E: PagedEndpoint>(
        &self,
        endpoint: &E,
        start: i64,
        end: i64,
    ) -> Result<Vec<E::Row>> {
        let mut cursor = start;
        let mut rows = Vec::new();
        let mut pages = 0usize;

        while cursor <= end {
            if self.cancel.is_cancelled() {
                return Err(MarketDataError::Cancelled);
            }

            let page = self.fetch_page(endpoint, cursor, end).await?;
            pages += 1;

            let Some(last) = page.last() else {
                match endpoint.empty_page_cursor(cursor).filter(|&next| next > cursor) {
                    Some(next) => {
                        debug!(provider = %self.provider, endpoint = endpoint.name(), cursor, next, "Empty page, skipping ahead");
                        cursor = next;
                        if cursor <= end {
                            cancellable_sleep(&self.cancel, self.page_delay).await?;
                        }
                        continue;
                    }
                    None => {
                        debug!(provider = %self.provider, endpoint = endpoint.name(), cursor, "Empty page, stopping");
                        break;
                    }
                }
            };
            let count = page.len();
            let next = endpoint.next_cursor(cursor, endpoint.row_time(last));
            rows.extend(page);

            debug!(
                provider = %self.provider,
                endpoint = endpoint.name(),
                cursor,
                rows = count,
                "Fetched page"
            );

            if endpoint.page_limit().is_some_and(|limit| count < limit) {
                break;
            }
            if next <= cursor {
                warn!(provider = %self.provider, endpoint = endpoint.name(), cursor, "Cursor did not advance, stopping");
                break;
            }
            cursor = next;

            if cursor <= end {
                cancellable_sleep(&self.cancel, self.page_delay).await?;
            }
        }

        debug!(provider = %self.provider, endpoint = endpoint.name(), pages, rows = rows.len(), "Pagination finished");
        Ok(rows)
    }

    /// One page with bounded retries
    async fn fetch_page<E: PagedEndpoint>(
        &self,
        endpoint: &E,
        cursor: i64,
        end: i64,
    ) -> Result<Vec<E::Row>> {
        let tag = self.provider.tag();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.limiter.acquire(&self.cancel).await?;

            let request = endpoint.request(cursor, end);
            let result = {
                let _timer = self.metrics.page_timer(tag);
                self.http.get(&request).await
            };

            let retry = match result {
                Ok(response) => match self.classify(endpoint, response)? {
                    Some(rows) => return Ok(rows),
                    None => Retry::RateLimited,
                },
                Err(e) => Retry::Transient(e.message),
            };

            let delay = match &retry {
                Retry::RateLimited => {
                    self.metrics.rate_limited(tag);
                    self.retry.rate_limit_delay(attempt)
                }
                Retry::Transient(_) => self.retry.transient_delay(attempt),
            };

            if attempt >= self.retry.max_attempts {
                return Err(match retry {
                    Retry::RateLimited => MarketDataError::RateLimited {
                        provider: self.provider,
                        attempts: attempt,
                    },
                    Retry::Transient(message) => MarketDataError::Transient {
                        provider: self.provider,
                        message,
                    },
                });
            }

            match &retry {
                Retry::RateLimited => warn!(
                    provider = %self.provider,
                    endpoint = endpoint.name(),
                    attempt,
                    "Rate limited, waiting {}s",
                    delay.as_secs_f64()
                ),
                Retry::Transient(message) => warn!(
                    provider = %self.provider,
                    endpoint = endpoint.name(),
                    attempt,
                    error = %message,
                    "Request failed, retrying in {}ms",
                    delay.as_millis()
                ),
            }

            cancellable_sleep(&self.cancel, delay).await?;
        }
    }

    /// `Some(rows)` on success, `None` when rate limited
    fn classify<E: PagedEndpoint>(
        &self,
        endpoint: &E,
        response: HttpResponse,
    ) -> Result<Option<Vec<E::Row>>> {
        if endpoint.is_rate_limit_status(response.status) {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(MarketDataError::Http {
                provider: self.provider,
                status: response.status,
            });
        }
        match endpoint.parse(&response.body)? {
            PageBody::Rows(rows) => Ok(Some(rows)),
            PageBody::RateLimited => Ok(None),
        }
    }
}
