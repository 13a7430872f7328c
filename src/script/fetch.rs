//! Content Acquirer (C1): fetch a URL into title/body/image metadata.

use crate::error::{Result, VideoGenError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT_SECONDS: u64 = 30;
const MIN_BODY_LENGTH: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub aria_describedby: Option<String>,
    pub resolved_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedContent {
    pub title: String,
    pub body: String,
    pub images: Vec<ImageMetadata>,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// Plain HTTP fetcher. Grounded on the teacher's thin `reqwest`-based
/// collaborator pattern (`transcribe/gemini.rs`'s single `reqwest::Client`).
/// The real HTML-to-text extraction and image-metadata scraping is delegated
/// to a narrow, swappable collaborator so tests can stub it with `wiremock`.
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
                .build()
                .expect("reqwest client builder"),
        }
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        debug!("fetching content from {url}");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VideoGenError::ContentFetch(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            return Err(VideoGenError::ContentFetch(format!(
                "{url} returned an empty body"
            )));
        }

        let extracted = extract_text_and_images(&html, url);
        if extracted.body.len() < MIN_BODY_LENGTH {
            return Err(VideoGenError::ContentFetch(format!(
                "{url}: extracted body is too short ({} chars, need >= {MIN_BODY_LENGTH})",
                extracted.body.len()
            )));
        }

        Ok(extracted)
    }
}

/// Strip HTML tags into a plain-text body and collect `<img>` metadata. A
/// minimal, dependency-free extractor; real deployments may swap in a
/// full HTML parser behind the same `ContentFetcher` trait.
fn extract_text_and_images(html: &str, base_url: &str) -> FetchedContent {
    let title = extract_tag_content(html, "title").unwrap_or_else(|| "Untitled".to_string());
    let body = strip_tags(html);
    let images = extract_images(html, base_url);

    FetchedContent {
        title,
        body,
        images,
    }
}

fn extract_tag_content(html: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = html.find(&open)?;
    let content_start = html[start..].find('>')? + start + 1;
    let end = html[content_start..].find(&close)? + content_start;
    Some(html[content_start..end].trim().to_string())
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut skip_depth = 0u32;
    let lower = html.to_lowercase();
    let mut i = 0;
    let bytes = html.as_bytes();
    while i < bytes.len() {
        for tag in ["script", "style", "title"] {
            if lower[i..].starts_with(&format!("<{tag}")) {
                skip_depth += 1;
            }
            if lower[i..].starts_with(&format!("</{tag}>")) {
                skip_depth = skip_depth.saturating_sub(1);
            }
        }
        let c = bytes[i] as char;
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && skip_depth == 0 => out.push(c),
            _ => {}
        }
        i += 1;
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_images(html: &str, base_url: &str) -> Vec<ImageMetadata> {
    let mut images = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("<img") {
        let tag_end = match rest[start..].find('>') {
            Some(e) => start + e,
            None => break,
        };
        let tag = &rest[start..tag_end];
        if let Some(src) = extract_attr(tag, "src") {
            images.push(ImageMetadata {
                resolved_url: resolve_url(base_url, &src),
                src,
                alt: extract_attr(tag, "alt"),
                title: extract_attr(tag, "title"),
                aria_describedby: extract_attr(tag, "aria-describedby"),
            });
        }
        rest = &rest[tag_end..];
    }
    images
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn resolve_url(base_url: &str, src: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }
    match url::Url::parse(base_url).and_then(|b| b.join(src)) {
        Ok(joined) => joined.to_string(),
        Err(_) => src.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_removes_markup_and_scripts() {
        let html = "<html><head><title>T</title><script>evil()</script></head><body><p>Hello <b>world</b></p></body></html>";
        let text = strip_tags(html);
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn extract_images_resolves_relative_urls() {
        let html = r#"<img src="/a.png" alt="Database architecture diagram" title="db">"#;
        let images = extract_images(html, "https://example.com/blog/post");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].resolved_url, "https://example.com/a.png");
        assert_eq!(images[0].alt.as_deref(), Some("Database architecture diagram"));
    }

    #[test]
    fn extract_tag_content_finds_title() {
        let html = "<html><head><title>My Page</title></head></html>";
        assert_eq!(extract_tag_content(html, "title"), Some("My Page".to_string()));
    }
}
