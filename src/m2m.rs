//! The USGS EROS M2M JSON API: the transport seam and response envelope handling.
mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{token_from_env, Client};

use crate::error::M2mError;
use anyhow::Result;
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const TOKEN_ENV: &str = "EROS_API_TOKEN";

pub const SCENE_SEARCH: &str = "scene-search";
pub const DOWNLOAD_OPTIONS: &str = "download-options";
pub const DOWNLOAD_REQUEST: &str = "download-request";

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

pub trait M2mOps {
    /// POSTs a JSON payload to an API endpoint and returns the raw response document.
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value>;

    /// GETs a download URL, yielding the body in chunks.
    async fn get_stream(&self, url: &str) -> Result<ByteStream>;
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    data: Value,
    error_code: Option<String>,
    error_message: Option<String>,
}

/// Calls an endpoint and unwraps the `data` member of the M2M envelope.
///
/// Returns `Ok(None)` when the service answers with a null or missing `data`.
pub async fn call<T: DeserializeOwned>(
    ops: &impl M2mOps,
    endpoint: &str,
    payload: &Value,
) -> Result<Option<T>> {
    let response = ops.post(endpoint, payload).await?;
    let unexpected = |detail: String| M2mError::UnexpectedResponse {
        endpoint: endpoint.to_string(),
        detail,
    };

    let envelope: Envelope =
        serde_json::from_value(response).map_err(|e| unexpected(e.to_string()))?;

    if let Some(code) = envelope.error_code {
        return Err(M2mError::Api {
            code,
            message: envelope.error_message.unwrap_or_default(),
        }
        .into());
    }

    if envelope.data.is_null() {
        return Ok(None);
    }
    let data = serde_json::from_value(envelope.data).map_err(|e| unexpected(e.to_string()))?;
    Ok(Some(data))
}
