use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{CredsyncError, Result};
use crate::remote::{Collection, CollectionSummary, EnvEntry, EnvironmentApi};

pub const DEFAULT_BASE_URL: &str = "https://api.getpostman.com";

/// Connection settings for the environment API, built once per command.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ApiConfig {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CredsyncError::ApiKeyMissing)?;
        let base_url = base_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

/// Blocking HTTP implementation of [`EnvironmentApi`].
pub struct HttpEnvironmentClient {
    http: Client,
    config: ApiConfig,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    environments: Vec<CollectionSummary>,
}

#[derive(Deserialize)]
struct EnvironmentResponse {
    environment: Collection,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    environment: UpdateBody<'a>,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    name: &'a str,
    values: &'a [EnvEntry],
}

impl HttpEnvironmentClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("credsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn environment_url(&self, id: &str) -> String {
        self.url(&format!("/environments/{}", urlencoding::encode(id)))
    }
}

impl EnvironmentApi for HttpEnvironmentClient {
    fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let response = self
            .http
            .get(self.url("/environments"))
            .bearer_auth(&self.config.api_key)
            .send()?;
        let body: ListResponse = check(response)?.json()?;
        Ok(body.environments)
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let response = self
            .http
            .get(self.environment_url(id))
            .bearer_auth(&self.config.api_key)
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: EnvironmentResponse = check(response)?.json()?;
        Ok(Some(body.environment))
    }

    fn update_collection(&self, id: &str, name: &str, values: &[EnvEntry]) -> Result<Collection> {
        let request = UpdateRequest {
            environment: UpdateBody { name, values },
        };
        let response = self
            .http
            .put(self.environment_url(id))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;
        let body: EnvironmentResponse = check(response)?.json()?;
        Ok(body.environment)
    }
}

/// Turn a non-2xx response into an `Api` error carrying the response body.
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(CredsyncError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: String) -> HttpEnvironmentClient {
        let config = ApiConfig::new(Some(base_url.as_str()), Some("test-key")).unwrap();
        HttpEnvironmentClient::new(config).unwrap()
    }

    #[test]
    fn test_api_config_requires_key() {
        assert!(matches!(
            ApiConfig::new(None, Some("  ")),
            Err(CredsyncError::ApiKeyMissing)
        ));
    }

    #[test]
    fn test_api_config_defaults_base_url_and_trims_slash() {
        let config = ApiConfig::new(None, Some("k")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        let config = ApiConfig::new(Some("http://localhost:1234/"), Some("k")).unwrap();
        assert_eq!(config.base_url, "http://localhost:1234");
    }

    #[test]
    fn test_environment_url_escapes_id() {
        let client = client_for("http://localhost:1234".into());
        assert_eq!(
            client.environment_url("abc-123"),
            "http://localhost:1234/environments/abc-123"
        );
        assert_eq!(
            client.environment_url("a/b c"),
            "http://localhost:1234/environments/a%2Fb%20c"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_collection_parses_environment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments/env-1"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "environment": {
                    "id": "env-1",
                    "name": "Staging",
                    "values": [
                        {"key": "api_url", "value": "https://example.test", "enabled": true, "type": "default"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let collection = tokio::task::spawn_blocking(move || client_for(base).get_collection("env-1"))
            .await
            .unwrap()
            .unwrap()
            .expect("collection should exist");

        assert_eq!(collection.name, "Staging");
        assert_eq!(collection.values.len(), 1);
        assert_eq!(collection.values[0].key, "api_url");
        assert_eq!(collection.values[0].extra.get("type"), Some(&json!("default")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_collection_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = server.uri();
        let result = tokio::task::spawn_blocking(move || client_for(base).get_collection("missing"))
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_collection_sends_name_and_values() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/environments/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "environment": {"id": "env-1", "name": "Staging"}
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let updated = tokio::task::spawn_blocking(move || {
            let values = vec![EnvEntry::new("aws_access_key_id", "AKIA")];
            client_for(base).update_collection("env-1", "Staging", &values)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.name, "Staging");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["environment"]["name"], "Staging");
        assert_eq!(body["environment"]["values"][0]["key"], "aws_access_key_id");
        assert_eq!(body["environment"]["values"][0]["value"], "AKIA");
        assert_eq!(body["environment"]["values"][0]["enabled"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || client_for(base).list_collections())
            .await
            .unwrap()
            .unwrap_err();
        match err {
            CredsyncError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_collections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "environments": [
                    {"id": "a", "name": "Alpha", "owner": "1"},
                    {"id": "b", "name": "Beta", "owner": "1"}
                ]
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let list = tokio::task::spawn_blocking(move || client_for(base).list_collections())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            list,
            vec![
                CollectionSummary { id: "a".into(), name: "Alpha".into() },
                CollectionSummary { id: "b".into(), name: "Beta".into() },
            ]
        );
    }
}
