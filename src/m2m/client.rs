use super::{ByteStream, M2mOps};
use crate::error::M2mError;
use anyhow::{Context, Result};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

const AUTH_HEADER: &str = "x-auth-token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed access to the M2M API, authenticated with an API token.
pub struct Client {
    client: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        // `Url::join` drops the last path segment unless the base ends with a slash
        let base_url = if api_url.ends_with('/') {
            Url::parse(api_url)
        } else {
            Url::parse(&format!("{}/", api_url))
        }
        .with_context(|| format!("Invalid API url: {}", api_url))?;

        let mut token = HeaderValue::from_str(token).context("Invalid API token")?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_env(api_url: &str, token_env: &'static str) -> Result<Self> {
        let token = token_from_env(token_env)?;
        Self::new(api_url, &token)
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint)?)
    }
}

/// Reads the API token from `token_env`; an empty value counts as missing.
pub fn token_from_env(token_env: &'static str) -> Result<String> {
    let token = std::env::var(token_env)
        .ok()
        .filter(|t| !t.is_empty())
        .ok_or(M2mError::MissingToken(token_env))?;
    Ok(token)
}

impl M2mOps for Client {
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(response)
    }

    async fn get_stream(&self, url: &str) -> Result<ByteStream> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let stream = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(anyhow::Error::from)
            .boxed();
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let client = Client::new("https://m2m.cr.usgs.gov/api/api/json/stable/", "t").unwrap();
        let url = client.endpoint_url("scene-search").unwrap();
        assert_eq!(
            url.as_str(),
            "https://m2m.cr.usgs.gov/api/api/json/stable/scene-search"
        );
    }

    #[test]
    fn test_endpoint_url_without_trailing_slash() {
        let client = Client::new("https://m2m.cr.usgs.gov/api/api/json/stable", "t").unwrap();
        let url = client.endpoint_url("download-request").unwrap();
        assert_eq!(
            url.as_str(),
            "https://m2m.cr.usgs.gov/api/api/json/stable/download-request"
        );
    }

    #[test]
    fn test_rejects_invalid_token_header() {
        assert!(Client::new("https://example.com/", "bad\ntoken").is_err());
    }

    #[test]
    fn test_from_env_missing_token() {
        let err = Client::from_env("https://example.com/", "M2M_FETCH_TEST_UNSET_TOKEN")
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<M2mError>(),
            Some(M2mError::MissingToken(_))
        ));
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        std::env::set_var("M2M_FETCH_TEST_EMPTY_TOKEN", "");
        let err = token_from_env("M2M_FETCH_TEST_EMPTY_TOKEN").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<M2mError>(),
            Some(M2mError::MissingToken("M2M_FETCH_TEST_EMPTY_TOKEN"))
        ));
    }

    #[test]
    fn test_token_from_env() {
        std::env::set_var("M2M_FETCH_TEST_SET_TOKEN", "secret");
        assert_eq!(token_from_env("M2M_FETCH_TEST_SET_TOKEN").unwrap(), "secret");
    }
}
