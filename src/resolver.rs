//! Extraction service client
//!
//! Submits one link to the extraction service and maps the tagged JSON answer
//! onto a [`Resolution`]. There is no retry at this layer: a transport error is
//! returned to the caller, which logs it and moves on to the next link.
//!
//! Response contract (only the fields this client reads):
//!
//! ```json
//! { "status": "redirect" | "tunnel", "url": "https://..." }
//! { "status": "picker", "picker": [{ "type": "photo", "url": "https://..." }], "audio": "https://..." }
//! { "status": "error", "error": { "code": "..." } }
//! ```

use crate::config::ServiceConfig;
use crate::error::{ResolveError, Result};
use crate::types::{ExportedLink, FailureReason, Resolution};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Body of a link-resolution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest<'a> {
    /// Link to resolve
    pub url: &'a str,
    /// Requested video quality
    pub video_quality: &'a str,
    /// Prefer H.265 video
    #[serde(rename = "tiktokH265")]
    pub h265: bool,
    /// Requested audio format
    pub audio_format: &'a str,
}

/// Client for the extraction service
#[derive(Clone)]
pub struct ResolveClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl ResolveClient {
    /// Create a client with its own HTTP connection pool
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Build the request body for `link`
    pub fn request_for<'a>(&'a self, link: &'a ExportedLink) -> ResolveRequest<'a> {
        ResolveRequest {
            url: &link.canonical,
            video_quality: &self.config.video_quality,
            h265: self.config.h265,
            audio_format: &self.config.audio_format,
        }
    }

    /// Ask the service to resolve `link`
    ///
    /// A non-success HTTP status is a [`Resolution::Failure`] with
    /// [`FailureReason::Http`], distinct from a service-reported error.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Network`] when the request itself fails
    /// - [`ResolveError::MalformedResponse`] when a success response is not JSON
    pub async fn resolve(&self, link: &ExportedLink) -> Result<Resolution> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&self.request_for(link))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Ok(Resolution::Failure(FailureReason::Http {
                status: status.as_u16(),
                body,
            }));
        }

        debug!(link = %link, response = %body, "service response");
        parse_response(&body).map_err(|e| {
            ResolveError::MalformedResponse {
                link: link.canonical.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Interpret a success response body
///
/// `redirect` and `tunnel` are both direct media URLs. `picker` is a gallery
/// only when its first item is a photo. Only `status` decides the branch; each
/// branch reads its own fields and ignores the rest, whatever their type.
pub fn parse_response(body: &str) -> std::result::Result<Resolution, serde_json::Error> {
    let response: Value = serde_json::from_str(body)?;
    Ok(interpret(&response))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn interpret(response: &Value) -> Resolution {
    let raw_status = response
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match raw_status.as_str() {
        "redirect" | "tunnel" => match str_field(response, "url") {
            Some(media_url) => Resolution::Direct {
                media_url: media_url.to_string(),
            },
            None => Resolution::Unrecognized {
                raw_status,
                detail: "response has no media url".to_string(),
            },
        },
        "picker" => {
            let items = response
                .get("picker")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let first_kind = items.first().and_then(|item| str_field(item, "type"));
            match first_kind {
                Some("photo") => Resolution::Gallery {
                    image_urls: items
                        .iter()
                        .filter_map(|item| str_field(item, "url"))
                        .map(str::to_string)
                        .collect(),
                    audio_url: str_field(response, "audio").map(str::to_string),
                },
                Some(other) => Resolution::Unrecognized {
                    detail: format!("unsupported picker media type '{other}'"),
                    raw_status,
                },
                None => Resolution::Unrecognized {
                    raw_status,
                    detail: "picker has no typed items".to_string(),
                },
            }
        }
        "error" => Resolution::Failure(FailureReason::Service(
            response.get("error").cloned().unwrap_or(Value::Null),
        )),
        _ => Resolution::Unrecognized {
            detail: format!("unknown status '{raw_status}'"),
            raw_status,
        },
    }
}
