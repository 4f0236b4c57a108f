//! Discovery of export URLs from directory-listing pages.
//!
//! The feed publishes exports under Apache-style index pages. A crawl walks
//! them depth first, in page order, yielding archive URLs (and optionally
//! directory URLs) as it goes. Pages are fetched lazily: nothing below a
//! directory is requested until the caller pulls past it.
//!
//! # Example
//!
//! ```no_run
//! use epf_core::crawler::{CrawlOptions, Crawler};
//! use epf_core::download::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::new(HttpClient::new()?, CrawlOptions::default());
//! let mut stream = crawler.crawl("https://feeds.example.com/epf/v5/current/");
//! while let Some(url) = stream.next().await {
//!     println!("{}", url?);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod listing;

pub use error::CrawlError;
pub use listing::{LISTING_MARKER, extract_links, is_listing};

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::download::HttpClient;

/// Caller-supplied link filter. Receives the link as written in the page.
pub type LinkFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How a crawl walks the listing tree.
#[derive(Clone)]
pub struct CrawlOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Yield directory URLs as well as archives.
    pub yield_dirs: bool,
    /// Links rejected here are neither yielded nor descended into.
    pub filter: Option<LinkFilter>,
    /// Deepest listing level to fetch, the root being level 0.
    pub max_depth: Option<usize>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            yield_dirs: false,
            filter: None,
            max_depth: None,
        }
    }
}

impl fmt::Debug for CrawlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlOptions")
            .field("recursive", &self.recursive)
            .field("yield_dirs", &self.yield_dirs)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl CrawlOptions {
    /// Sets the link filter.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn accepts(&self, link: &str) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(link))
    }

    fn may_descend(&self, depth: usize) -> bool {
        self.recursive && self.max_depth.is_none_or(|max| depth < max)
    }
}

/// Walks listing pages with one shared client.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: HttpClient,
    options: CrawlOptions,
    cancel: Option<CancellationToken>,
}

impl Crawler {
    /// Creates a crawler.
    #[must_use]
    pub fn new(client: HttpClient, options: CrawlOptions) -> Self {
        Self {
            client,
            options,
            cancel: None,
        }
    }

    /// Stops the crawl before the next page fetch once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Starts a crawl at `root`, which should end with `/`.
    #[must_use]
    pub fn crawl(&self, root: &str) -> CrawlStream<'_> {
        CrawlStream {
            crawler: self,
            frontier: Vec::new(),
            descend: Some((root.to_string(), 0)),
            finished: false,
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>, CrawlError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(CrawlError::Cancelled {
                url: url.to_string(),
            });
        }
        let response = self
            .client
            .get(url)
            .await
            .map_err(|source| CrawlError::Fetch {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| CrawlError::Fetch {
            url: url.to_string(),
            source: crate::download::DownloadError::network(url, e),
        })?;
        if !is_listing(&body) {
            return Err(CrawlError::NotAListing {
                url: url.to_string(),
            });
        }
        let links = extract_links(&body);
        debug!(count = links.len(), "listing fetched");
        Ok(links)
    }
}

/// One fetched listing page still being walked.
struct Frame {
    base: String,
    depth: usize,
    links: std::vec::IntoIter<String>,
}

/// Pull-based crawl in pre-order.
///
/// The frontier is an explicit stack of partly consumed listing pages, so
/// arbitrarily deep trees never grow the call stack.
pub struct CrawlStream<'a> {
    crawler: &'a Crawler,
    frontier: Vec<Frame>,
    descend: Option<(String, usize)>,
    finished: bool,
}

impl CrawlStream<'_> {
    /// Returns the next discovered URL, or `None` when the crawl is over.
    ///
    /// After an error the stream is finished.
    pub async fn next(&mut self) -> Option<Result<String, CrawlError>> {
        if self.finished {
            return None;
        }
        let crawler = self.crawler;
        let options = &crawler.options;
        loop {
            if let Some((url, depth)) = self.descend.take() {
                match crawler.fetch_links(&url).await {
                    Ok(links) => self.frontier.push(Frame {
                        base: url,
                        depth,
                        links: links.into_iter(),
                    }),
                    Err(error) => {
                        self.finished = true;
                        self.frontier.clear();
                        return Some(Err(error));
                    }
                }
            }

            let Some(frame) = self.frontier.last_mut() else {
                self.finished = true;
                return None;
            };
            let Some(link) = frame.links.next() else {
                self.frontier.pop();
                continue;
            };
            if !options.accepts(&link) {
                debug!(%link, "filtered out");
                continue;
            }

            let url = format!("{}{link}", frame.base);
            let is_dir = link.ends_with('/');
            if is_dir && options.may_descend(frame.depth) {
                self.descend = Some((url.clone(), frame.depth + 1));
            }
            if !is_dir || options.yield_dirs {
                return Some(Ok(url));
            }
        }
    }

    /// Drains the crawl into a list, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first [`CrawlError`] encountered.
    pub async fn collect(mut self) -> Result<Vec<String>, CrawlError> {
        let mut urls = Vec::new();
        while let Some(url) = self.next().await {
            urls.push(url?);
        }
        Ok(urls)
    }
}
