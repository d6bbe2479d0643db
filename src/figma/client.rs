//! Figma REST backend for [`DesignSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::api_types::{FigmaFile, FigmaImageExport};
use super::{DesignSource, ExportSet};
use crate::{DcovError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum FigmaAuth {
    PersonalAccessToken(String),
    OAuthToken(String),
}

impl FigmaAuth {
    pub fn from_env() -> Option<Self> {
        if let Ok(token) = std::env::var("FIGMA_TOKEN") {
            if !token.is_empty() {
                return Some(Self::PersonalAccessToken(token));
            }
        }

        if let Ok(token) = std::env::var("FIGMA_OAUTH_TOKEN") {
            if !token.is_empty() {
                return Some(Self::OAuthToken(token));
            }
        }

        None
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            FigmaAuth::PersonalAccessToken(token) => builder.header("X-FIGMA-TOKEN", token),
            FigmaAuth::OAuthToken(token) => builder.bearer_auth(token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FigmaRestSource {
    http: Client,
    auth: Option<FigmaAuth>,
    base_url: Url,
}

impl FigmaRestSource {
    pub fn new(base_url: impl AsRef<str>, auth: Option<FigmaAuth>) -> Result<Self> {
        Self::with_timeout(base_url, auth, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl AsRef<str>,
        auth: Option<FigmaAuth>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DcovError::Network)?;

        Ok(Self {
            http,
            auth,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(DcovError::InvalidUrl)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => auth.apply(builder),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(DcovError::Network)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        if status.is_success() {
            let body = response.text().await.map_err(DcovError::Network)?;
            return serde_json::from_str(&body).map_err(DcovError::Serialization);
        }

        let body = response.text().await.unwrap_or_default();

        Err(DcovError::source_api(
            Some(status),
            error_message(status, &body, retry_after.as_deref()),
        ))
    }
}

#[async_trait]
impl DesignSource for FigmaRestSource {
    async fn fetch_file(&self, sample_id: &str) -> Result<Arc<FigmaFile>> {
        let url = self.endpoint(&format!("/v1/files/{sample_id}"))?;
        match self.send_json::<FigmaFile>(url).await {
            Ok(file) => Ok(Arc::new(file)),
            Err(DcovError::SourceApi {
                status: Some(StatusCode::NOT_FOUND),
                ..
            }) => Err(DcovError::SourceNotFound {
                sample_id: sample_id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn fetch_exports(&self, sample_id: &str, frame_ids: &[String]) -> Result<ExportSet> {
        if frame_ids.is_empty() {
            return Ok(ExportSet::new());
        }

        let ids = frame_ids.join(",");
        let url = self.endpoint(&format!(
            "/v1/images/{sample_id}?ids={ids}&format=png&scale=1"
        ))?;

        let unavailable = |message: String| DcovError::ExportsUnavailable {
            sample_id: sample_id.to_string(),
            message,
        };

        let export: FigmaImageExport = self
            .send_json(url)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if let Some(err) = export.err {
            return Err(unavailable(err));
        }
        collect_export_urls(export, frame_ids).map_err(unavailable)
    }
}

/// Keeps the rendered URLs for the requested ids. A `null` or missing entry
/// is left out of the set; only an all-null response means the renders are
/// not ready.
fn collect_export_urls(
    export: FigmaImageExport,
    frame_ids: &[String],
) -> std::result::Result<ExportSet, String> {
    let mut images = export.images;
    let mut set = ExportSet::new();
    for id in frame_ids {
        match images.remove(id).flatten() {
            Some(url) => {
                set.insert(id.clone(), url);
            }
            None => debug!(node = %id, "no rendered export for node"),
        }
    }
    if set.is_empty() {
        return Err(format!(
            "no rendered export for any of {} requested nodes",
            frame_ids.len()
        ));
    }
    Ok(set)
}

fn error_message(status: StatusCode, body: &str, retry_after: Option<&str>) -> String {
    let fallback = format!("Figma API returned status {}", status.as_u16());
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_body = parsed
        .as_ref()
        .and_then(|value| value.get("err").or_else(|| value.get("error")))
        .and_then(Value::as_str)
        .map(str::to_owned);

    match (status, retry_after, from_body) {
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), Some(msg)) => {
            format!("{msg} (rate limited, retry after {retry}s)")
        }
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), None) => {
            format!("rate limited by Figma API, retry after {retry}s")
        }
        (_, _, Some(msg)) => msg,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn error_message_prefers_body_err_field() {
        let msg = error_message(StatusCode::NOT_FOUND, r#"{"status":404,"err":"Not found"}"#, None);
        assert_eq!(msg, "Not found");
    }

    #[test]
    fn error_message_mentions_retry_after_for_rate_limits() {
        let msg = error_message(StatusCode::TOO_MANY_REQUESTS, "", Some("30"));
        assert!(msg.contains("retry after 30s"), "got: {msg}");
    }

    #[test]
    fn error_message_falls_back_to_status() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "<html>", None);
        assert_eq!(msg, "Figma API returned status 502");
    }

    #[test]
    fn null_export_url_is_left_out() {
        let mut images = HashMap::new();
        images.insert("1:2".to_string(), Some("https://x/1.png".to_string()));
        images.insert("1:3".to_string(), None);
        let export = FigmaImageExport { images, err: None };

        let set = collect_export_urls(export, &["1:2".to_string(), "1:3".to_string()])
            .expect("partial set");
        assert_eq!(set.len(), 1);
        assert!(set.contains_key("1:2"));
        assert!(!set.contains_key("1:3"));
    }

    #[test]
    fn all_null_exports_are_unavailable() {
        let mut images = HashMap::new();
        images.insert("1:2".to_string(), None);
        let export = FigmaImageExport { images, err: None };

        let err = collect_export_urls(export, &["1:2".to_string(), "1:3".to_string()]).unwrap_err();
        assert!(err.contains("2 requested nodes"), "got: {err}");
    }

    #[test]
    fn export_urls_are_scoped_to_requested_ids() {
        let mut images = HashMap::new();
        images.insert("1:2".to_string(), Some("https://x/1.png".to_string()));
        images.insert("9:9".to_string(), Some("https://x/9.png".to_string()));
        let export = FigmaImageExport { images, err: None };

        let set = collect_export_urls(export, &["1:2".to_string()]).expect("set");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("1:2").map(String::as_str), Some("https://x/1.png"));
    }

    /// Serves `status` and `body` to every connection on a local port.
    async fn serve(status: u16, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/")
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_file_maps_to_source_not_found() {
        let base = serve(404, r#"{"status":404,"err":"Not found"}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");

        let err = source.fetch_file("S404").await.unwrap_err();
        assert!(
            matches!(&err, DcovError::SourceNotFound { sample_id } if sample_id == "S404"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn server_error_on_exports_is_unavailable() {
        let base = serve(500, r#"{"status":500,"err":"Internal error"}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");

        let err = source.fetch_exports("S1", &ids(&["F1"])).await.unwrap_err();
        assert!(
            matches!(&err, DcovError::ExportsUnavailable { message, .. } if message.contains("Internal error")),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn export_err_field_is_unavailable() {
        let base = serve(200, r#"{"err":"Render timeout","images":{}}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");

        let err = source.fetch_exports("S1", &ids(&["F1"])).await.unwrap_err();
        assert!(matches!(err, DcovError::ExportsUnavailable { .. }));
    }

    #[tokio::test]
    async fn null_frame_export_keeps_the_other_frames() {
        let base = serve(200, r#"{"err":null,"images":{"F1":null,"F2":"https://cdn/f2.png"}}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");

        let set = source
            .fetch_exports("S1", &ids(&["F1", "F2"]))
            .await
            .expect("partial exports");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("F2").map(String::as_str), Some("https://cdn/f2.png"));
    }

    #[tokio::test]
    async fn resolver_leaves_null_assets_for_placeholders() {
        use crate::codegen::{ImageResolver, SourceImageResolver};

        let base = serve(200, r#"{"err":null,"images":{"1:2":"https://cdn/logo.png","1:3":null}}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");
        let resolver = SourceImageResolver::new(&source, "S1");

        let urls = resolver.resolve(&ids(&["1:2", "1:3"])).await.expect("resolve");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls.get("1:2").map(String::as_str), Some("https://cdn/logo.png"));
    }

    #[tokio::test]
    async fn resolver_with_no_rendered_assets_is_empty() {
        use crate::codegen::{ImageResolver, SourceImageResolver};

        let base = serve(200, r#"{"err":null,"images":{"1:3":null}}"#).await;
        let source = FigmaRestSource::new(&base, None).expect("source");
        let resolver = SourceImageResolver::new(&source, "S1");

        let urls = resolver.resolve(&ids(&["1:3"])).await.expect("resolve");
        assert!(urls.is_empty());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = FigmaRestSource::new("not a url", None).unwrap_err();
        assert!(matches!(err, DcovError::InvalidUrl(_)));
    }
}
