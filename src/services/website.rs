//! Website fetch and extract pipeline.
//!
//! Fetches the root page of a business website plus a few same-host
//! informational pages, strips markup and code fragments, and returns the
//! cleaned text with a frequency-ordered keyword list. Every failure is
//! reported inside [`WebsiteAnalysis::error`]; `analyze` never fails.

use futures::stream::{FuturesUnordered, StreamExt};
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{redirect, Client, Response};
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::WebsiteSettings;
use crate::core::text;

const MAX_REDIRECTS: usize = 5;
const ROBOTS_TIMEOUT: Duration = Duration::from_millis(1_000);
const ROBOTS_MAX_BYTES: usize = 64 * 1024;

/// Elements whose text is never visible content
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Path or anchor-text fragments of pages worth following
const INFORMATIONAL_HINTS: &[&str] = &[
    "about", "contact", "product", "service", "company", "solution", "what-we-do", "who-we-are",
];

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name][content]").expect("valid meta selector"));

/// Why the pipeline produced no web evidence
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WebsiteError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Excluded by robots directive: {0}")]
    RobotsExcluded(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for WebsiteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebsiteError::Timeout(err.to_string())
        } else {
            WebsiteError::Fetch(err.to_string())
        }
    }
}

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAnalysis {
    pub url: String,
    pub cleaned_text: String,
    pub extracted_keywords: Vec<String>,
    pub pages_visited: Vec<String>,
    pub elapsed_ms: u64,
    pub error: Option<WebsiteError>,
}

impl WebsiteAnalysis {
    fn failed(url: &str, error: WebsiteError, started: Instant) -> Self {
        Self {
            url: url.to_string(),
            cleaned_text: String::new(),
            extracted_keywords: Vec::new(),
            pages_visited: Vec::new(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: Some(error),
        }
    }

    pub fn has_evidence(&self) -> bool {
        self.error.is_none() && !self.cleaned_text.is_empty()
    }
}

/// Visible text and candidate links of one HTML document
#[derive(Debug, Clone, Default)]
struct ExtractedPage {
    text: String,
    links: Vec<Url>,
    noindex: bool,
}

/// `User-agent: *` rules of a robots.txt file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    allow: Vec<String>,
    disallow: Vec<String>,
}

impl RobotsRules {
    pub fn parse(body: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut in_wildcard_group = false;
        let mut last_was_agent = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // Consecutive user-agent lines share one group
                    if !last_was_agent {
                        in_wildcard_group = false;
                    }
                    in_wildcard_group |= value == "*";
                    last_was_agent = true;
                }
                "allow" if in_wildcard_group => {
                    last_was_agent = false;
                    if !value.is_empty() {
                        rules.allow.push(value.to_string());
                    }
                }
                "disallow" if in_wildcard_group => {
                    last_was_agent = false;
                    if !value.is_empty() {
                        rules.disallow.push(value.to_string());
                    }
                }
                _ => last_was_agent = false,
            }
        }
        rules
    }

    /// Longest matching rule wins; allow wins ties
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|r| path.starts_with(r.as_str()))
                .map(|r| r.len())
                .max()
        };
        match (longest(&self.allow), longest(&self.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}

/// Fetches and extracts business websites
pub struct WebsitePipeline {
    client: Client,
    settings: WebsiteSettings,
}

impl WebsitePipeline {
    pub fn new(settings: WebsiteSettings) -> Result<Self, WebsiteError> {
        let client = Client::builder()
            .timeout(settings.page_timeout())
            .connect_timeout(settings.page_timeout())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| WebsiteError::Client(e.to_string()))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &WebsiteSettings {
        &self.settings
    }

    /// Fetch the site behind `url` within the overall deadline
    pub async fn analyze(&self, url: &str) -> WebsiteAnalysis {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.overall_deadline();

        let root = match parse_http_url(url) {
            Ok(root) => root,
            Err(e) => return WebsiteAnalysis::failed(url, e, started),
        };

        let robots = if self.settings.respect_robots_txt {
            self.fetch_robots(&root).await
        } else {
            RobotsRules::default()
        };
        if !robots.is_allowed(root.path()) {
            return WebsiteAnalysis::failed(
                url,
                WebsiteError::RobotsExcluded(format!("robots.txt disallows {}", root.path())),
                started,
            );
        }

        let root_page = match tokio::time::timeout_at(deadline, self.fetch_page(&root)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                debug!("Website fetch failed for {}: {}", url, e);
                return WebsiteAnalysis::failed(url, e, started);
            }
            Err(_) => {
                debug!("Website fetch for {} exceeded overall deadline", url);
                return WebsiteAnalysis::failed(
                    url,
                    WebsiteError::Timeout("overall deadline elapsed".into()),
                    started,
                );
            }
        };

        if root_page.noindex {
            return WebsiteAnalysis::failed(url, WebsiteError::RobotsExcluded("meta robots".into()), started);
        }
        if root_page.text.is_empty() {
            return WebsiteAnalysis::failed(
                url,
                WebsiteError::Parse(format!("no visible text at {}", root)),
                started,
            );
        }

        let mut pages_visited = vec![root.to_string()];
        let mut texts = vec![root_page.text.clone()];

        let follow: Vec<Url> = root_page
            .links
            .iter()
            .filter(|link| robots.is_allowed(link.path()))
            .take(self.settings.max_followed_pages)
            .cloned()
            .collect();

        if !follow.is_empty() {
            let mut pending: FuturesUnordered<_> = follow
                .iter()
                .enumerate()
                .map(|(idx, link)| async move { (idx, self.fetch_page(link).await) })
                .collect();

            let mut followed: Vec<(usize, ExtractedPage)> = Vec::new();
            loop {
                match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(Some((idx, Ok(page)))) => {
                        if page.noindex {
                            debug!("Skipping noindex page {}", follow[idx]);
                        } else {
                            followed.push((idx, page));
                        }
                    }
                    Ok(Some((idx, Err(e)))) => debug!("Followed page {} failed: {}", follow[idx], e),
                    Ok(None) => break,
                    Err(_) => {
                        debug!("Overall deadline reached with {} followed pages pending", pending.len());
                        break;
                    }
                }
            }

            // Completion order is nondeterministic; document order is not
            followed.sort_by_key(|(idx, _)| *idx);
            for (idx, page) in followed {
                pages_visited.push(follow[idx].to_string());
                texts.push(page.text);
            }
        }

        let mut cleaned_text = texts
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        text::truncate_chars(&mut cleaned_text, self.settings.max_text_chars);

        let extracted_keywords = text::extract_keywords(&cleaned_text, self.settings.max_keywords);

        WebsiteAnalysis {
            url: url.to_string(),
            cleaned_text,
            extracted_keywords,
            pages_visited,
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: None,
        }
    }

    async fn fetch_robots(&self, root: &Url) -> RobotsRules {
        let Ok(robots_url) = root.join("/robots.txt") else {
            return RobotsRules::default();
        };

        let fetch = async {
            let response = self.client.get(robots_url.clone()).send().await.ok()?;
            if !response.status().is_success() {
                return None;
            }
            let body = read_capped(response, ROBOTS_MAX_BYTES).await.ok()?;
            Some(RobotsRules::parse(&String::from_utf8_lossy(&body)))
        };

        match tokio::time::timeout(ROBOTS_TIMEOUT, fetch).await {
            Ok(Some(rules)) => rules,
            // Unreachable or missing robots.txt allows everything
            _ => RobotsRules::default(),
        }
    }

    async fn fetch_page(&self, url: &Url) -> Result<ExtractedPage, WebsiteError> {
        let response = tokio::time::timeout(self.settings.page_timeout(), self.client.get(url.clone()).send())
            .await
            .map_err(|_| WebsiteError::Timeout(format!("{} after {}ms", url, self.settings.page_timeout_ms)))??;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(WebsiteError::Status(status.as_u16()));
        }

        check_content_type(response.headers())?;
        if robots_header_excludes(response.headers()) {
            return Err(WebsiteError::RobotsExcluded("X-Robots-Tag".into()));
        }

        let final_url = response.url().clone();
        let body = tokio::time::timeout(
            self.settings.page_timeout(),
            read_capped(response, self.settings.max_response_bytes),
        )
        .await
        .map_err(|_| WebsiteError::Timeout(format!("reading body of {}", url)))??;

        let html = String::from_utf8_lossy(&body);
        Ok(extract_page(&html, &final_url))
    }
}

fn parse_http_url(raw: &str) -> Result<Url, WebsiteError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| WebsiteError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(WebsiteError::InvalidUrl(raw.to_string()));
    }
    Ok(parsed)
}

fn check_content_type(headers: &HeaderMap) -> Result<(), WebsiteError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime == "text/html" || mime == "application/xhtml+xml" {
        Ok(())
    } else if mime.is_empty() {
        Err(WebsiteError::UnsupportedContentType("missing".into()))
    } else {
        Err(WebsiteError::UnsupportedContentType(mime.to_string()))
    }
}

fn robots_header_excludes(headers: &HeaderMap) -> bool {
    headers
        .get_all("x-robots-tag")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(directive_excludes)
}

fn directive_excludes(value: &str) -> bool {
    value
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .any(|d| d == "noindex" || d == "none")
}

/// Read at most `max_bytes` of the body, dropping the rest
async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, WebsiteError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes.saturating_sub(body.len());
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            warn!("Response from {} truncated at {} bytes", response.url(), max_bytes);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn is_informational(link: &Url, anchor_text: &str) -> bool {
    let path = link.path().to_ascii_lowercase();
    let anchor = anchor_text.to_lowercase();
    INFORMATIONAL_HINTS
        .iter()
        .any(|hint| path.contains(hint) || anchor.contains(hint))
}

/// Visible text (code fragments removed) and same-host informational links
fn extract_page(html: &str, base: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    if let Some(title) = document.select(&TITLE_SELECTOR).next() {
        raw.push_str(&title.text().collect::<String>());
        raw.push(' ');
    }

    let mut noindex = false;
    for meta in document.select(&META_SELECTOR) {
        let name = meta.value().attr("name").unwrap_or("").to_ascii_lowercase();
        let content = meta.value().attr("content").unwrap_or("");
        match name.as_str() {
            "description" => {
                raw.push_str(content);
                raw.push(' ');
            }
            "robots" => noindex |= directive_excludes(content),
            _ => {}
        }
    }

    for node in document.root_element().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(fragment);
            raw.push(' ');
        }
    }

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut link) = base.join(href) else {
            continue;
        };
        link.set_fragment(None);
        if link.host_str() != base.host_str() || !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        if link.path() == base.path() {
            continue;
        }
        let anchor_text: String = anchor.text().collect();
        if is_informational(&link, &anchor_text) && seen.insert(link.to_string()) {
            links.push(link);
        }
    }

    ExtractedPage {
        text: text::strip_code_tokens(&raw),
        links,
        noindex,
    }
}
