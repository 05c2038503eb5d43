use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Error body returned by PostgREST when a statement fails.
///
/// Carried inside `anyhow::Error`; callers that care about the SQLSTATE
/// recover it with `downcast_ref::<PostgrestError>()`.
#[derive(Debug, Clone, Deserialize, thiserror::Error)]
#[error("PostgREST error ({status}) {code:?}: {message}")]
pub struct PostgrestError {
    #[serde(skip)]
    pub status: u16,
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl PostgrestError {
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match serde_json::from_str::<PostgrestError>(&error_text) {
                Ok(mut postgrest) => {
                    postgrest.status = status.as_u16();
                    anyhow::Error::new(postgrest)
                }
                Err(_) => match status.as_u16() {
                    401 | 403 => anyhow!("Authentication error: {}", error_text),
                    404 => anyhow!("Resource not found: {}", error_text),
                    _ => anyhow!("API error ({}): {}", status, error_text),
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Calls a Postgres function exposed under `/rest/v1/rpc/`.
    pub async fn rpc<T>(&self, function: &str, auth_token: Option<&str>, args: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(args)).await
    }
}

/// `Prefer: return=representation` so writes echo the stored rows.
pub fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
