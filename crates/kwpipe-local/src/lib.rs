use futures_util::StreamExt;
use kwpipe_core::{Error, FetchedPage, PageFetcher, Result};
use std::net::SocketAddr;
use tracing::{debug, info, warn};
use url::Url;

pub mod assemble;
pub mod config;
pub mod extract;
pub mod netguard;
pub mod ngram;
pub mod tokenize;

pub use assemble::{analyze_html, keywords_for_url, HtmlAnalysis, ResponseAssembler};
pub use config::AnalyzerConfig;

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// HTTP fetcher that refuses private-network targets and bounds redirects, time and size.
///
/// Notes:
/// - Redirects are followed by hand so every `Location` goes through [`netguard`] first.
/// - One deadline (`fetch_timeout`) covers every hop and the whole body.
/// - The body is streamed; the byte cap applies whether or not `Content-Length` is sent.
#[derive(Debug, Clone)]
pub struct SafeFetcher {
    client: reqwest::Client,
    config: AnalyzerConfig,
}

impl SafeFetcher {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        if config.allow_private_hosts {
            warn!("private-address guard disabled; loopback and internal hosts are reachable");
        }
        let client = Self::client_builder(&config)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AnalyzerConfig::from_env())
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn client_builder(config: &AnalyzerConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.fetch_timeout)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.config.fetch_timeout)
        } else {
            Error::Fetch(e.to_string())
        }
    }

    /// Client for one hop. With `resolve_hosts` on, the hostname is resolved here, every
    /// address is checked, and the connection is pinned to those addresses.
    async fn client_for(&self, url: &Url) -> Result<reqwest::Client> {
        if !self.config.resolve_hosts {
            return Ok(self.client.clone());
        }
        let Some(url::Host::Domain(domain)) = url.host() else {
            return Ok(self.client.clone());
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| Error::Fetch(format!("dns lookup failed for {domain}: {e}")))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Fetch(format!("dns lookup returned no addresses for {domain}")));
        }
        if !self.config.allow_private_hosts {
            if let Some(bad) = addrs.iter().find(|a| netguard::is_blocked_ip(a.ip())) {
                return Err(Error::PrivateAddressBlocked(format!(
                    "{domain} resolves to {}",
                    bad.ip()
                )));
            }
        }
        Self::client_builder(&self.config)
            .resolve_to_addrs(domain, &addrs)
            .build()
            .map_err(|e| Error::Config(e.to_string()))
    }

    async fn fetch_inner(&self, raw: &str) -> Result<FetchedPage> {
        let allow_private = self.config.allow_private_hosts;
        let mut current = netguard::check_url(raw, allow_private)?;
        let mut redirects = 0usize;

        let resp = loop {
            let client = self.client_for(&current).await?;
            debug!(url = %current, hop = redirects, "fetching");
            let resp = client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            let status = resp.status();
            if !status.is_redirection() {
                break resp;
            }
            let Some(location) = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Err(Error::HttpError(status.as_u16()));
            };
            if redirects >= self.config.max_redirects {
                warn!(url = raw, limit = self.config.max_redirects, "redirect limit hit");
                return Err(Error::TooManyRedirects(self.config.max_redirects));
            }
            let next = current
                .join(location)
                .map_err(|e| Error::InvalidUrl(format!("{location}: {e}")))?;
            netguard::check_parsed(&next, allow_private)?;
            debug!(from = %current, to = %next, status = status.as_u16(), "following redirect");
            redirects += 1;
            current = next;
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpError(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let mut warnings = Vec::new();
        if content_type_lc_prefix(content_type.as_deref()) != "text/html" {
            warnings.push(format!(
                "unexpected content type {}; parsing as html anyway",
                content_type.as_deref().unwrap_or("(none)")
            ));
        }

        let limit = self.config.max_bytes;
        if resp.content_length().is_some_and(|n| n > limit) {
            return Err(Error::PayloadTooLarge { limit });
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            if (body.len() as u64).saturating_add(chunk.len() as u64) > limit {
                return Err(Error::PayloadTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        info!(url = %current, bytes = body.len(), redirects, "fetched page");
        Ok(FetchedPage {
            url: raw.to_string(),
            final_url: current.to_string(),
            status: status.as_u16(),
            content_type,
            bytes: body.len() as u64,
            html: String::from_utf8_lossy(&body).into_owned(),
            redirects,
            warnings,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for SafeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let deadline = self.config.fetch_timeout;
        match tokio::time::timeout(deadline, self.fetch_inner(url)).await {
            Ok(r) => r,
            Err(_) => {
                warn!(url, ms = deadline.as_millis() as u64, "fetch deadline exceeded");
                Err(Error::Timeout(deadline))
            }
        }
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let deadline = self.config.probe_timeout;
        let fut = async {
            let u = netguard::check_url(url, self.config.allow_private_hosts)?;
            let client = self.client_for(&u).await?;
            let resp = client
                .head(u)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            Ok::<_, Error>(resp.status().as_u16())
        };
        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }
}
