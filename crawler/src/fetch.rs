//! Fetch-and-clean: turns a URL into page text plus outbound links.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header;
use scraper::{Html, Selector};
use search_core::{Error, Result};
use tracing::debug;
use url::Url;

/// Text never shown to readers.
const HIDDEN_ELEMENTS: [&str; 5] = ["head", "script", "style", "noscript", "template"];

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub text: String,
    /// Absolute http(s) links without fragments, in document order.
    pub links: Vec<Url>,
}

pub trait PageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> Result<Page>;
}

impl<T: PageFetcher> PageFetcher for Arc<T> {
    fn fetch(&self, url: &Url) -> Result<Page> {
        self.as_ref().fetch(url)
    }
}

pub struct HttpFetcher {
    client: Client,
    retries: usize,
}

impl HttpFetcher {
    pub const DEFAULT_RETRIES: usize = 3;

    pub fn new(retries: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("search-crawler/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("unable to build http client: {e}")))?;
        Ok(Self { client, retries: retries.max(1) })
    }

    fn fetch_html(&self, url: &Url) -> Result<String> {
        let mut last_error = String::new();
        for attempt in 1..=self.retries {
            match self.client.get(url.clone()).send() {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        return Err(fetch_error(url, format!("status {}", resp.status())));
                    }
                    if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
                        if let Ok(v) = ct.to_str() {
                            if !v.starts_with("text/html") {
                                return Err(fetch_error(url, format!("content type {v}")));
                            }
                        }
                    }
                    return resp.text().map_err(|e| fetch_error(url, e.to_string()));
                }
                Err(err) => {
                    debug!(%url, attempt, error = %err, "fetch attempt failed");
                    last_error = err.to_string();
                }
            }
        }
        Err(fetch_error(url, last_error))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Page> {
        let html = self.fetch_html(url)?;
        parse_page(url, &html)
    }
}

fn fetch_error(url: &Url, reason: String) -> Error {
    Error::Fetch { url: url.to_string(), reason }
}

/// Strips a fragment so `page#a` and `page#b` are the same document.
pub fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Extracts visible text and resolved links from `html` served at `url`.
pub fn parse_page(url: &Url, html: &str) -> Result<Page> {
    let document = Html::parse_document(html);

    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(chunk) = node.value().as_text() else { continue };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            text.push_str(chunk);
            text.push('\n');
        }
    }

    let anchors = Selector::parse("a[href]")
        .map_err(|e| Error::InvalidConfig(format!("failed to parse selector: {e}")))?;
    let links = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| url.join(href.trim()).ok())
        .filter(|link| matches!(link.scheme(), "http" | "https"))
        .map(|link| normalize(&link))
        .collect();

    Ok(Page { text, links })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html>
<head><title>Ignored title</title><style>.x { color: red }</style></head>
<body>
<h1>Hello  World</h1>
<script>var hidden = "secret";</script>
<p>See <a href="/about#team">about</a>, <a href="https://example.org/x">x</a>,
<a href="mailto:me@example.com">mail</a> and <a href="next.html">next</a>.</p>
</body></html>"#;

    #[test]
    fn extracts_visible_text() {
        let url = Url::parse("https://example.com/docs/index.html").unwrap();
        let page = parse_page(&url, HTML).unwrap();
        assert!(page.text.contains("Hello  World"));
        assert!(page.text.contains("about"));
        assert!(!page.text.contains("secret"));
        assert!(!page.text.contains("Ignored"));
        assert!(!page.text.contains("color"));
    }

    #[test]
    fn resolves_links_and_drops_fragments() {
        let url = Url::parse("https://example.com/docs/index.html").unwrap();
        let page = parse_page(&url, HTML).unwrap();
        let links: Vec<&str> = page.links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/about",
                "https://example.org/x",
                "https://example.com/docs/next.html",
            ]
        );
    }

    #[test]
    fn normalize_removes_fragment_only() {
        let url = Url::parse("http://example.com/a?q=1#frag").unwrap();
        assert_eq!(normalize(&url).as_str(), "http://example.com/a?q=1");
    }
}
