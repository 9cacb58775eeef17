//! Syntactic and scheme checks on caller-supplied URLs.

use reqwest::Url;

use crate::error::PipelineError;

/// Classification of a candidate URL. Pure, never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    /// The string does not parse as an absolute URL.
    Invalid,
    /// Parses, but the scheme is not `https`.
    Insecure,
    Accepted(Url),
}

impl UrlVerdict {
    pub fn into_result(self) -> Result<Url, PipelineError> {
        match self {
            Self::Invalid => Err(PipelineError::InvalidUrl),
            Self::Insecure => Err(PipelineError::InsecureUrl),
            Self::Accepted(url) => Ok(url),
        }
    }
}

pub fn classify_url(candidate: &str) -> UrlVerdict {
    let Ok(url) = Url::parse(candidate.trim()) else {
        return UrlVerdict::Invalid;
    };
    if url.scheme() != "https" {
        return UrlVerdict::Insecure;
    }
    // `https:foo` parses but has no host to fetch from.
    if url.host_str().map_or(true, str::is_empty) {
        return UrlVerdict::Invalid;
    }
    UrlVerdict::Accepted(url)
}
