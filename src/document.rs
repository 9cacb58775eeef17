//! Fetching a document over HTTP and flattening it into a text corpus.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::fmt::Debug;
use tracing::{debug, error, info, instrument};

use crate::error::FetchError;

/// Elements whose text makes up the corpus, matched in document order.
const CONTENT_SELECTOR: &str = "article, section, p, h1, h2, h3";

/// Text extracted from one document. Lives for a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub corpus: String,
    pub title: String,
}

/// Source of raw HTML for an accepted URL.
#[async_trait]
pub trait DocumentSource: Send + Sync + Debug {
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError>;
}

const MAX_REDIRECTS: usize = 10;

/// Follow redirects only while they stay on https.
fn https_only_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.url().scheme() != "https" {
            let target = attempt.url().to_string();
            attempt.error(format!("refusing redirect to non-https URL {}", target))
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// Single unauthenticated GET. No retry; timeouts are whatever the
/// transport applies.
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    http: Client,
}

impl HttpDocumentSource {
    pub fn new() -> Result<Self, FetchError> {
        let http = Client::builder()
            .redirect(https_only_redirects())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    #[instrument(target = "doc_quiz::document", skip(self), fields(url = %url))]
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            error!(error = %e, "Document request failed");
            FetchError::Transport(e.to_string())
        })?;

        let status = response.status();
        debug!(status = %status, "Received document response");
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url: url.to_string() });
        }

        response.text().await.map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Flatten markup into `{corpus, title}`. Never fails: markup without any
/// content elements yields an empty corpus.
pub fn extract_document(html: &str) -> Document {
    let page = Html::parse_document(html);

    let mut corpus = String::new();
    if let Ok(content) = Selector::parse(CONTENT_SELECTOR) {
        for element in page.select(&content) {
            corpus.extend(element.text());
            corpus.push('\n');
        }
    }

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| page.select(&sel).next().map(|t| t.text().collect::<String>()))
        .unwrap_or_default();

    Document { corpus, title }
}

#[instrument(target = "doc_quiz::document", skip(source), fields(url = %url))]
pub async fn fetch_document(source: &dyn DocumentSource, url: &Url) -> Result<Document, FetchError> {
    let html = source.fetch_html(url).await?;
    let document = extract_document(&html);
    info!(
        html_len = html.len(),
        corpus_len = document.corpus.len(),
        title = %document.title,
        "Extracted document"
    );
    Ok(document)
}
