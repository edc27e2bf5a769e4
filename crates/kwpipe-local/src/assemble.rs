//! End-to-end analysis: fetch, extract, tokenize and score one page, plus the two crawler
//! probes, folded into a single [`KeywordsResponse`].

use crate::config::AnalyzerConfig;
use crate::extract::{extract_with_stats, Extraction};
use crate::ngram;
use crate::tokenize::tokenize;
use crate::SafeFetcher;
use kwpipe_core::{
    Diagnostics, Error, ExtractedContent, FetchedPage, KeywordFinding, KeywordsResponse,
    PageFetcher, Result, TokenizedContent,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Status recorded for a probe that could not be issued or did not complete.
pub const PROBE_FAILURE_STATUS: u16 = 404;

const NO_TOKENS_WARNING: &str = "no content tokens left after filtering";

/// Offline analysis of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlAnalysis {
    pub extracted: ExtractedContent,
    pub tokenized: TokenizedContent,
    pub findings: Vec<KeywordFinding>,
    pub stripped_tags: usize,
}

impl HtmlAnalysis {
    pub fn content_tokens(&self) -> usize {
        self.tokenized.body_token_count()
    }
}

/// Extract, tokenize and score `html` without touching the network.
///
/// `source_url` only feeds the URL-slug zone; it is never fetched.
pub fn analyze_html(html: &str, source_url: &str) -> HtmlAnalysis {
    let Extraction {
        content,
        stripped_tags,
    } = extract_with_stats(html, source_url);
    let tokenized = tokenize(&content);
    let findings = ngram::score(&tokenized, tokenized.body_token_count());
    HtmlAnalysis {
        extracted: content,
        tokenized,
        findings,
        stripped_tags,
    }
}

fn probe_target(url: &str, path: &str) -> Option<String> {
    let base = url::Url::parse(url.trim()).ok()?;
    base.join(path).ok().map(|u| u.to_string())
}

pub struct ResponseAssembler<F> {
    fetcher: F,
    max_keywords: Option<usize>,
}

impl<F: PageFetcher> ResponseAssembler<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            max_keywords: None,
        }
    }

    pub fn with_max_keywords(mut self, max: Option<usize>) -> Self {
        self.max_keywords = max;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    async fn probe_or_fallback(&self, target: Option<String>) -> u16 {
        let Some(target) = target else {
            return PROBE_FAILURE_STATUS;
        };
        match self.fetcher.probe(&target).await {
            Ok(status) => status,
            Err(e) => {
                debug!(url = %target, error = %e, "probe failed");
                PROBE_FAILURE_STATUS
            }
        }
    }

    async fn primary(&self, url: &str) -> Result<(FetchedPage, HtmlAnalysis)> {
        let mut page = self.fetcher.fetch(url).await?;
        let html = std::mem::take(&mut page.html);
        let source_url = url.to_string();
        // CPU-bound; runs on the blocking pool.
        let analysis = tokio::task::spawn_blocking(move || analyze_html(&html, &source_url))
            .await
            .map_err(|e| Error::Analysis(e.to_string()))?;
        Ok((page, analysis))
    }

    /// Analyze `url`. Never fails: any fetch error becomes a degraded response with a warning.
    pub async fn analyze(&self, url: &str) -> KeywordsResponse {
        let (primary, robots, sitemap) = tokio::join!(
            self.primary(url),
            self.probe_or_fallback(probe_target(url, "/robots.txt")),
            self.probe_or_fallback(probe_target(url, "/sitemap.xml")),
        );

        let mut diagnostics = Diagnostics {
            robots_txt: Some(robots),
            sitemap_xml: Some(sitemap),
            ..Diagnostics::default()
        };

        let (page, analysis) = match primary {
            Ok(ok) => ok,
            Err(e) => {
                if let Error::HttpError(status) = e {
                    diagnostics.http_status = Some(status);
                }
                warn!(url, error = %e, "analysis degraded");
                let warning = match e {
                    Error::Analysis(_) => e.to_string(),
                    _ => format!("fetch failed: {e}"),
                };
                diagnostics.warnings.push(warning);
                return KeywordsResponse::degraded(url, diagnostics);
            }
        };

        diagnostics.http_status = Some(page.status);
        diagnostics.bytes = Some(page.bytes);
        diagnostics.stripped_tags_count = analysis.stripped_tags;
        diagnostics.warnings.extend(page.warnings);

        let content_tokens = analysis.content_tokens();
        if content_tokens == 0 {
            diagnostics.warnings.push(NO_TOKENS_WARNING.to_string());
        }

        let mut all = analysis.findings;
        ngram::truncate_ranked(&mut all, self.max_keywords);
        info!(
            url,
            content_tokens,
            keywords = all.len(),
            "analysis complete"
        );
        KeywordsResponse::from_ranked(url, content_tokens, all, diagnostics)
    }
}

/// Analyze `url` with a [`SafeFetcher`] configured from the environment.
pub async fn keywords_for_url(url: &str) -> KeywordsResponse {
    let config = AnalyzerConfig::from_env();
    let max_keywords = config.max_keywords;
    match SafeFetcher::new(config) {
        Ok(fetcher) => {
            ResponseAssembler::new(fetcher)
                .with_max_keywords(max_keywords)
                .analyze(url)
                .await
        }
        Err(e) => {
            warn!(error = %e, "fetcher construction failed");
            KeywordsResponse::degraded(
                url,
                Diagnostics {
                    warnings: vec![format!("fetcher unavailable: {e}")],
                    ..Diagnostics::default()
                },
            )
        }
    }
}
