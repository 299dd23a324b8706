//! Domain entities for the Papers domain

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use paperchat_common::{Error, Result};

lazy_static! {
    /// arXiv identifier, new-style numbering with optional version
    pub static ref ARXIV_ID_REGEX: Regex = Regex::new(r"^\d{4}\.\d{4,5}(?:v\d+)?$").unwrap();

    /// arXiv abstract or PDF page; the `.pdf` suffix is optional
    static ref ARXIV_URL_REGEX: Regex = Regex::new(
        r"^https?://arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}(?:v\d+)?)(?:\.pdf)?$"
    )
    .unwrap();
}

/// Validated arXiv identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArxivId(String);

impl ArxivId {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if !ARXIV_ID_REGEX.is_match(value) {
            return Err(Error::Validation(format!(
                "Invalid arXiv ID format: {}",
                value
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn pdf_url(&self) -> String {
        format!("https://arxiv.org/pdf/{}", self.0)
    }

    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.0)
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArxivId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArxivId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ArxivId> for String {
    fn from(id: ArxivId) -> Self {
        id.0
    }
}

/// A paper as the user referred to it, resolved to its document URL
///
/// arXiv ids and arXiv URLs resolve to the canonical PDF URL so every way of
/// naming a paper shares one conversation. Anything else is used verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRef {
    /// Document URL; also the resource identifier for storage
    pub url: String,
    /// Short form shown to the user
    pub display_url: String,
    pub arxiv_id: Option<ArxivId>,
}

impl PaperRef {
    pub fn resolve(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidResourceId);
        }

        let arxiv_id = if ARXIV_ID_REGEX.is_match(input) {
            Some(ArxivId(input.to_string()))
        } else {
            ARXIV_URL_REGEX
                .captures(input)
                .map(|caps| ArxivId(caps[1].to_string()))
        };

        Ok(match arxiv_id {
            Some(id) => Self {
                url: id.pdf_url(),
                display_url: format!("arXiv:{}", id),
                arxiv_id: Some(id),
            },
            None => Self {
                url: input.to_string(),
                display_url: input.to_string(),
                arxiv_id: None,
            },
        })
    }

    pub fn is_arxiv(&self) -> bool {
        self.arxiv_id.is_some()
    }
}

/// Metadata returned by the arXiv fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArxivRecord {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub arxiv_id: String,
    /// Abstract page URL
    pub url: String,
}

/// Cached description of a paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    /// Document URL the paper was opened with
    pub url: String,
    pub display_url: String,
    pub fetched_at: DateTime<Utc>,
}

impl PaperMetadata {
    pub fn from_arxiv(record: ArxivRecord, paper: &PaperRef) -> Self {
        Self {
            title: record.title,
            authors: record.authors,
            abstract_text: record.abstract_text,
            arxiv_id: Some(record.arxiv_id),
            url: paper.url.clone(),
            display_url: paper.display_url.clone(),
            fetched_at: Utc::now(),
        }
    }

    /// Metadata for papers with no arXiv record
    pub fn basic(paper: &PaperRef) -> Self {
        Self {
            title: paper.display_url.clone(),
            authors: Vec::new(),
            abstract_text: String::new(),
            arxiv_id: paper.arxiv_id.as_ref().map(|id| id.to_string()),
            url: paper.url.clone(),
            display_url: paper.display_url.clone(),
            fetched_at: Utc::now(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.display_url
        } else {
            &self.title
        }
    }

    /// "A", "A and B" or "A et al."
    pub fn author_line(&self) -> String {
        match self.authors.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{} and {}", first, second),
            [first, ..] => format!("{} et al.", first),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ArxivRecord {
        ArxivRecord {
            title: "Attention Is All You Need".to_string(),
            authors: vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()],
            abstract_text: "The dominant sequence transduction models...".to_string(),
            arxiv_id: "1706.03762".to_string(),
            url: "https://arxiv.org/abs/1706.03762".to_string(),
        }
    }

    #[test]
    fn test_arxiv_id_format() {
        assert!(ArxivId::parse("2301.12345").is_ok());
        assert!(ArxivId::parse("1706.03762v7").is_ok());
        assert!(ArxivId::parse("0704.0001").is_ok());

        assert!(ArxivId::parse("2301.123").is_err());
        assert!(ArxivId::parse("hep-th/9901001").is_err());
        assert!(ArxivId::parse("2301.12345v").is_err());
        assert!(ArxivId::parse("").is_err());
    }

    #[test]
    fn test_arxiv_id_urls() {
        let id: ArxivId = "2301.12345".parse().unwrap();
        assert_eq!(id.pdf_url(), "https://arxiv.org/pdf/2301.12345");
        assert_eq!(id.abs_url(), "https://arxiv.org/abs/2301.12345");
    }

    #[test]
    fn test_resolve_bare_id() {
        let paper = PaperRef::resolve("2301.12345").unwrap();
        assert_eq!(paper.url, "https://arxiv.org/pdf/2301.12345");
        assert_eq!(paper.display_url, "arXiv:2301.12345");
        assert!(paper.is_arxiv());
    }

    #[test]
    fn test_resolve_arxiv_urls_share_resource() {
        let expected = "https://arxiv.org/pdf/1706.03762v7";
        for input in [
            "https://arxiv.org/abs/1706.03762v7",
            "https://arxiv.org/pdf/1706.03762v7.pdf",
            "https://arxiv.org/pdf/1706.03762v7",
            "  1706.03762v7 ",
        ] {
            let paper = PaperRef::resolve(input).unwrap();
            assert_eq!(paper.url, expected, "input {input}");
            assert_eq!(paper.arxiv_id.unwrap().as_str(), "1706.03762v7");
        }
    }

    #[test]
    fn test_resolve_other_url_verbatim() {
        let paper = PaperRef::resolve("https://example.org/papers/draft.pdf").unwrap();
        assert_eq!(paper.url, "https://example.org/papers/draft.pdf");
        assert_eq!(paper.display_url, paper.url);
        assert!(!paper.is_arxiv());

        // Other hosts are not treated as arXiv
        let mirror = PaperRef::resolve("https://export.arxiv.org/abs/2301.12345").unwrap();
        assert!(!mirror.is_arxiv());
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(
            PaperRef::resolve("   "),
            Err(Error::InvalidResourceId)
        ));
    }

    #[test]
    fn test_metadata_from_arxiv_keeps_opened_url() {
        let paper = PaperRef::resolve("1706.03762").unwrap();
        let metadata = PaperMetadata::from_arxiv(record(), &paper);

        assert_eq!(metadata.url, "https://arxiv.org/pdf/1706.03762");
        assert_eq!(metadata.display_url, "arXiv:1706.03762");
        assert_eq!(metadata.arxiv_id.as_deref(), Some("1706.03762"));
        assert_eq!(metadata.display_title(), "Attention Is All You Need");
    }

    #[test]
    fn test_basic_metadata_title_falls_back() {
        let paper = PaperRef::resolve("https://example.org/a.pdf").unwrap();
        let mut metadata = PaperMetadata::basic(&paper);
        assert_eq!(metadata.display_title(), "https://example.org/a.pdf");

        metadata.title = " ".to_string();
        assert_eq!(metadata.display_title(), "https://example.org/a.pdf");
    }

    #[test]
    fn test_author_line() {
        let paper = PaperRef::resolve("1706.03762").unwrap();
        let mut metadata = PaperMetadata::from_arxiv(record(), &paper);
        assert_eq!(metadata.author_line(), "Ashish Vaswani and Noam Shazeer");

        metadata.authors.push("Niki Parmar".to_string());
        assert_eq!(metadata.author_line(), "Ashish Vaswani et al.");

        metadata.authors.truncate(1);
        assert_eq!(metadata.author_line(), "Ashish Vaswani");

        metadata.authors.clear();
        assert_eq!(metadata.author_line(), "");
    }

    #[test]
    fn test_freshness() {
        let paper = PaperRef::resolve("1706.03762").unwrap();
        let metadata = PaperMetadata::basic(&paper);
        let now = metadata.fetched_at;

        assert!(metadata.is_fresh(Duration::hours(24), now + Duration::hours(23)));
        assert!(!metadata.is_fresh(Duration::hours(24), now + Duration::hours(24)));
    }

    #[test]
    fn test_metadata_wire_format() {
        let paper = PaperRef::resolve("1706.03762").unwrap();
        let json = serde_json::to_value(PaperMetadata::from_arxiv(record(), &paper)).unwrap();
        assert!(json.get("abstract").is_some());
        assert!(json.get("displayUrl").is_some());
        assert!(json.get("fetchedAt").is_some());
        assert_eq!(json["arxivId"], "1706.03762");
    }

    #[test]
    fn test_metadata_tolerates_sparse_records() {
        let json = r#"{"title":"T","url":"u","displayUrl":"d","fetchedAt":"2024-01-01T00:00:00Z","extra":1}"#;
        let metadata: PaperMetadata = serde_json::from_str(json).unwrap();
        assert!(metadata.authors.is_empty());
        assert!(metadata.arxiv_id.is_none());
    }
}
