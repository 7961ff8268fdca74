// ServiceNow Table API HTTP client.
// Handles basic auth, the fixed request timeout, and response status mapping.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::error::{NowSyncError, Result};

const TABLE_API_SUFFIX: &str = "/api/now/table";

/// Every remote call runs to completion or to this timeout; there is no
/// retry or cancellation below this layer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Table API client bound to one instance and one set of credentials.
/// Holds no record state; transport settings only.
pub struct NowClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl NowClient {
    /// Create a client for the given instance host.
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = format!("{}{}", host.trim_end_matches('/'), TABLE_API_SUFFIX);

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Make a GET request against the Table API.
    pub(crate) async fn get(&self, endpoint: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        self.check_response(response).await
    }

    /// Make a PATCH request with a JSON body against the Table API.
    pub(crate) async fn patch(&self, endpoint: &str, body: &Value) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .patch(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;

        self.check_response(response).await
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
            StatusCode::UNAUTHORIZED => Err(NowSyncError::Unauthorized),
            StatusCode::NOT_FOUND => Err(NowSyncError::NotFound(response.url().to_string())),
            status => Err(NowSyncError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = NowClient::new("https://dev12345.service-now.com/", "admin", "secret").unwrap();
        assert_eq!(
            client.base_url,
            "https://dev12345.service-now.com/api/now/table"
        );
    }
}
