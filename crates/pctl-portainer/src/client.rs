use std::time::Duration;

use futures::StreamExt;
use reqwest::{Method, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::{BuildEngine, BuildOptions};
use crate::error::ApiError;
use crate::stream::ByteStream;
use crate::types::{Container, Stack};

/// Client for the Portainer HTTP API.
///
/// Stack operations go through `/api/stacks`; image operations go
/// through the per-environment Docker proxy under
/// `/api/endpoints/{id}/docker`.
pub struct PortainerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    details: Option<String>,
}

impl PortainerClient {
    pub fn new(
        base_url: &str,
        api_token: &str,
        skip_tls_verify: bool,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        let mut token = header::HeaderValue::from_str(api_token)
            .unwrap_or_else(|_| header::HeaderValue::from_static(""));
        token.set_sensitive(true);
        headers.insert("X-API-Key", token);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_tls_verify)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::ClientBuild { source: e })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn api_error(resp: Response) -> ApiError {
        let status = resp.status().as_u16();
        let body = resp.bytes().await.unwrap_or_default();

        let message = match serde_json::from_slice::<ApiErrorBody>(&body) {
            Ok(parsed) => match (parsed.message, parsed.details) {
                (Some(message), Some(details)) if !details.is_empty() => {
                    format!("{message}: {details}")
                }
                (Some(message), _) => message,
                _ => String::from_utf8_lossy(&body).into_owned(),
            },
            Err(_) => String::from_utf8_lossy(&body).into_owned(),
        };

        ApiError::Api { status, message }
    }

    // ── Stacks ──

    /// Look up a stack by name within an environment. `None` when the
    /// stack does not exist.
    pub async fn get_stack(
        &self,
        name: &str,
        env_id: i64,
    ) -> Result<Option<Stack>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/stacks")
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        let stacks: Vec<Stack> = resp.json().await.map_err(|e| ApiError::Decode { source: e })?;
        Ok(stacks
            .into_iter()
            .find(|stack| stack.name == name && stack.environment_id == env_id))
    }

    pub async fn create_stack(
        &self,
        name: &str,
        compose_content: &str,
        env_id: i64,
    ) -> Result<Stack, ApiError> {
        let body = serde_json::json!({
            "name": name,
            "stackFileContent": compose_content,
        });

        let resp = self
            .request(
                Method::POST,
                &format!("/api/stacks/create/standalone/string?endpointId={env_id}"),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        resp.json().await.map_err(|e| ApiError::Decode { source: e })
    }

    pub async fn update_stack(
        &self,
        stack_id: i64,
        compose_content: &str,
        pull_images: bool,
        env_id: i64,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "prune": true,
            "pullImage": pull_images,
            "stackFileContent": compose_content,
        });

        let resp = self
            .request(
                Method::PUT,
                &format!("/api/stacks/{stack_id}?endpointId={env_id}"),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        Ok(())
    }

    /// Containers belonging to a compose stack, matched by the compose
    /// project label.
    pub async fn stack_containers(
        &self,
        env_id: i64,
        stack_name: &str,
    ) -> Result<Vec<Container>, ApiError> {
        let filters = serde_json::json!({
            "label": [format!("com.docker.compose.project={stack_name}")],
        })
        .to_string();

        let resp = self
            .request(
                Method::GET,
                &format!("/api/endpoints/{env_id}/docker/containers/json"),
            )
            .query(&[("all", "true"), ("filters", filters.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        resp.json().await.map_err(|e| ApiError::Decode { source: e })
    }

    /// Read a docker line-delimited JSON response, forwarding each line
    /// and surfacing any in-stream error marker as the call's failure.
    async fn forward_docker_lines(
        resp: Response,
        on_line: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<(), ApiError> {
        let mut body = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut stream_error: Option<String> = None;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ApiError::Http { source: e })?;
            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                emit_line(&line, on_line, &mut stream_error);
            }
        }
        if !buf.is_empty() {
            emit_line(&buf, on_line, &mut stream_error);
        }

        match stream_error {
            Some(message) => Err(ApiError::Build { message }),
            None => Ok(()),
        }
    }
}

fn emit_line(
    raw: &[u8],
    on_line: &(dyn Fn(&str) + Send + Sync),
    stream_error: &mut Option<String>,
) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return;
    }

    on_line(line);

    // The daemon answers 200 and reports failures as JSON lines with an
    // `error` / `errorDetail` payload; the first one wins.
    if stream_error.is_none() {
        if let Ok(value) = serde_json::from_str::<Value>(line) {
            let detail = value
                .get("errorDetail")
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str));
            if let Some(message) = detail {
                *stream_error = Some(message.to_owned());
            }
        }
    }
}

impl BuildEngine for PortainerClient {
    async fn image_exists(&self, env_id: i64, tag: &str) -> Result<bool, ApiError> {
        let resp = self
            .request(
                Method::GET,
                &format!("/api/endpoints/{env_id}/docker/images/{tag}/json"),
            )
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::api_error(resp).await),
        }
    }

    async fn build_image(
        &self,
        env_id: i64,
        context: ByteStream,
        options: &BuildOptions,
        on_line: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<(), ApiError> {
        let mut query: Vec<(&str, String)> = vec![
            ("t", options.tag.clone()),
            ("dockerfile", options.dockerfile.clone()),
        ];
        if !options.build_args.is_empty() {
            let buildargs = serde_json::to_string(&options.build_args)
                .map_err(|e| ApiError::EncodeBuildArgs { source: e })?;
            query.push(("buildargs", buildargs));
        }
        if let Some(target) = options.target.as_deref() {
            if !target.is_empty() {
                query.push(("target", target.to_owned()));
            }
        }
        if options.no_cache {
            query.push(("nocache", "true".to_owned()));
        }

        tracing::debug!(tag = %options.tag, env_id, "submitting remote build");

        let resp = self
            .request(Method::POST, &format!("/api/endpoints/{env_id}/docker/build"))
            .query(&query)
            .header(header::CONTENT_TYPE, "application/x-tar")
            .body(reqwest::Body::wrap_stream(context))
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        Self::forward_docker_lines(resp, on_line).await
    }

    async fn load_image(
        &self,
        env_id: i64,
        image: ByteStream,
        on_line: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<(), ApiError> {
        tracing::debug!(env_id, "uploading image archive");

        let resp = self
            .request(
                Method::POST,
                &format!("/api/endpoints/{env_id}/docker/images/load"),
            )
            .header(header::CONTENT_TYPE, "application/x-tar")
            .body(reqwest::Body::wrap_stream(image))
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        Self::forward_docker_lines(resp, on_line).await
    }

    async fn host_info(&self, env_id: i64) -> Result<Map<String, Value>, ApiError> {
        let resp = self
            .request(Method::GET, &format!("/api/endpoints/{env_id}/docker/info"))
            .send()
            .await
            .map_err(|e| ApiError::Http { source: e })?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        resp.json().await.map_err(|e| ApiError::Decode { source: e })
    }
}
