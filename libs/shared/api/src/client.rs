use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::ApiError;

/// Request/response access to the clinic backend.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.backend_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(auth_token)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 => ApiError::Unauthorized(error_text),
                403 => ApiError::Forbidden(error_text),
                404 => ApiError::NotFound(error_text),
                code => ApiError::Status { status: code, body: error_text },
            });
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(method, path, auth_token, body).await?;
        let bytes = response.bytes().await?;
        let data = serde_json::from_slice::<T>(&bytes)?;
        Ok(data)
    }

    pub async fn get<T>(&self, path: &str, auth_token: Option<&str>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, auth_token, None).await
    }

    /// Issue a command whose response body is not consumed.
    pub async fn send_command(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
    ) -> Result<(), ApiError> {
        let response = self.execute(method, path, auth_token, Some(Value::Object(Default::default()))).await?;
        debug!("Command {} accepted with status {}", path, response.status());
        Ok(())
    }
}
