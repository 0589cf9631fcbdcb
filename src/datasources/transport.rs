use crate::config::HttpConfig;
use crate::error::{PescaError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("pescascore/", env!("CARGO_PKG_VERSION"));

/// Minimal JSON GET seam shared by the tide and weather sources.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value>;
}

/// Routes requests for listed domains through a prefix-style CORS proxy.
#[derive(Debug, Clone)]
pub struct CorsProxy {
    prefix: String,
    domains: Vec<String>,
}

impl CorsProxy {
    pub fn new(prefix: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            domains,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Option<Self> {
        config
            .cors_proxy
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| Self::new(p.trim(), config.proxied_domains.clone()))
    }

    /// The URL to actually request. Unlisted or unparseable URLs pass through.
    pub fn rewrite(&self, target: &str) -> String {
        let Ok(parsed) = url::Url::parse(target) else {
            return target.to_string();
        };
        let Some(host) = parsed.host_str() else {
            return target.to_string();
        };

        let listed = self
            .domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{}", d)));
        if !listed {
            return target.to_string();
        }

        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("{}{}", self.prefix, encoded)
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    proxy: Option<CorsProxy>,
}

impl ReqwestTransport {
    pub fn new(proxy: Option<CorsProxy>) -> Self {
        Self {
            client: reqwest::Client::new(),
            proxy,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(CorsProxy::from_config(config))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        let request_url = match &self.proxy {
            Some(proxy) => proxy.rewrite(url),
            None => url.to_string(),
        };
        tracing::debug!("GET {}", request_url);

        let response = self
            .client
            .get(&request_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PescaError::Timeout(format!("{} after {:?}", url, timeout))
                } else {
                    PescaError::DataSourceUnavailable(format!("{}: {}", url, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(PescaError::DataSourceUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PescaError::InvalidData(format!("{}: {}", url, e)))
    }
}
