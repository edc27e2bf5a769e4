use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported url scheme: {0} (only http and https are allowed)")]
    InvalidScheme(String),
    #[error("blocked private or reserved address: {0}")]
    PrivateAddressBlocked(String),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("payload too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: u64 },
    #[error("http status {0}")]
    HttpError(u16),
    #[error("transport error: {0}")]
    Fetch(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse `raw` as an absolute URL and require an `http`/`https` scheme.
///
/// Host safety is not checked here; backends layer their own network policy on top.
pub fn parse_http_url(raw: &str) -> Result<url::Url> {
    let u = url::Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match u.scheme() {
        "http" | "https" => Ok(u),
        other => Err(Error::InvalidScheme(other.to_string())),
    }
}

/// Fully buffered page returned by a [`PageFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub html: String,
    /// Body size in bytes as received (before lossy UTF-8 decoding).
    pub bytes: u64,
    /// Redirect hops followed to reach `final_url`.
    pub redirects: usize,
    pub warnings: Vec<String>,
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieve a page body, enforcing the backend's network policy.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// Existence check (`HEAD`); returns the status code without following redirects.
    async fn probe(&self, url: &str) -> Result<u16>;
}

/// Labeled text zones pulled out of one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub title: String,
    pub meta_description: String,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub alt_texts: Vec<String>,
    pub main_content: String,
    pub url_slug: String,
}

/// [`ExtractedContent`] with every string replaced by its filtered token sequence.
///
/// Headings and alt texts keep one token sequence per source instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizedContent {
    pub title: Vec<String>,
    pub meta_description: Vec<String>,
    pub h1: Vec<Vec<String>>,
    pub h2: Vec<Vec<String>>,
    pub h3: Vec<Vec<String>>,
    pub alt_texts: Vec<Vec<String>>,
    pub main_content: Vec<String>,
    pub url_slug: Vec<String>,
}

impl TokenizedContent {
    pub fn body_token_count(&self) -> usize {
        self.main_content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.meta_description.is_empty()
            && self.h1.iter().all(Vec::is_empty)
            && self.h2.iter().all(Vec::is_empty)
            && self.h3.iter().all(Vec::is_empty)
            && self.alt_texts.iter().all(Vec::is_empty)
            && self.main_content.is_empty()
            && self.url_slug.is_empty()
    }
}

/// Structural zone a phrase was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Title,
    H1,
    H2,
    H3,
    Meta,
    Alt,
    Url,
    Content,
}

impl Position {
    pub const ALL: [Position; 8] = [
        Position::Title,
        Position::H1,
        Position::H2,
        Position::H3,
        Position::Meta,
        Position::Alt,
        Position::Url,
        Position::Content,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Title => "title",
            Position::H1 => "h1",
            Position::H2 => "h2",
            Position::H3 => "h3",
            Position::Meta => "meta",
            Position::Alt => "alt",
            Position::Url => "url",
            Position::Content => "content",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Bitset over [`Position`]; serialized as a list of tag names in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Position>", into = "Vec<Position>")]
pub struct PositionSet(u8);

impl PositionSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, p: Position) {
        self.0 |= p.bit();
    }

    pub fn contains(self, p: Position) -> bool {
        self.0 & p.bit() != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Position> {
        Position::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Position> for PositionSet {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        let mut s = PositionSet::new();
        for p in iter {
            s.insert(p);
        }
        s
    }
}

impl From<Vec<Position>> for PositionSet {
    fn from(v: Vec<Position>) -> Self {
        v.into_iter().collect()
    }
}

impl From<PositionSet> for Vec<Position> {
    fn from(s: PositionSet) -> Self {
        s.iter().collect()
    }
}

/// Density band annotations. A finding may carry a band label and `Good` at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    High,
    Medium,
    Low,
    Good,
}

impl Label {
    /// Labels for a (rounded) density percentage.
    pub fn for_density(density: f64) -> Vec<Label> {
        let mut out = Vec::new();
        if density >= 3.0 {
            out.push(Label::High);
        } else if density >= 1.0 {
            out.push(Label::Medium);
        } else if density >= 0.1 {
            out.push(Label::Low);
        }
        if (0.5..=2.0).contains(&density) {
            out.push(Label::Good);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordFinding {
    pub rank: usize,
    pub keyword: String,
    pub tokens: u8,
    pub frequency: u32,
    pub density: f64,
    pub score: f64,
    pub positions: PositionSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl KeywordFinding {
    pub fn is_short_tail(&self) -> bool {
        self.tokens <= 2
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robots_txt: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_xml: Option<u16>,
    pub stripped_tags_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsResponse {
    pub source_url: String,
    pub content_tokens: usize,
    pub all: Vec<KeywordFinding>,
    pub short_tail: Vec<KeywordFinding>,
    pub long_tail: Vec<KeywordFinding>,
    pub diagnostics: Diagnostics,
}

impl KeywordsResponse {
    /// Build a response from a ranked finding list; the tail views are derived from `all`.
    pub fn from_ranked(
        source_url: impl Into<String>,
        content_tokens: usize,
        all: Vec<KeywordFinding>,
        diagnostics: Diagnostics,
    ) -> Self {
        let (short_tail, long_tail): (Vec<_>, Vec<_>) =
            all.iter().cloned().partition(KeywordFinding::is_short_tail);
        Self {
            source_url: source_url.into(),
            content_tokens,
            all,
            short_tail,
            long_tail,
            diagnostics,
        }
    }

    /// Successful-shape response with no findings.
    pub fn degraded(source_url: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self::from_ranked(source_url, 0, Vec::new(), diagnostics)
    }
}
