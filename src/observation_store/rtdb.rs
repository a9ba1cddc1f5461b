//! Realtime Database REST client
//!
//! `GET {base}{path}.json` reads a subtree, `POST {base}{path}.json`
//! pushes a child with a server-generated key.
//!
//! "Latest" is resolved client-side: a `shallow=true` read lists the child
//! keys, the maximum under `compare_keys` is picked, then that one child is
//! fetched. Server-side `$key` ordering only treats keys as integers up to
//! 32 bits, so it is not relied on.

use super::{latest_key, Observation, ObservationStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Push response body (`{"name": "<generated key>"}`)
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// REST client for a Realtime Database instance
pub struct RtdbClient {
    http: Client,
    base_url: String,
    auth: Option<String>,
}

impl RtdbClient {
    /// Create new client
    pub fn new(base_url: &str, auth: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build store HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Resource URL for a store path
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, path)
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(token) => req.query(&[("auth", token.as_str())]),
            None => req,
        }
    }

    /// GET a path as JSON (`null` when nothing is stored there)
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let req = self.http.get(self.url_for(path)).query(query);

        let resp = self
            .with_auth(req)
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("GET {} failed: {}", path, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::StoreUnavailable(format!(
                "GET {} returned {} - {}",
                path, status, body
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("GET {} bad body: {}", path, e)))
    }
}

#[async_trait]
impl ObservationStore for RtdbClient {
    async fn get_latest(&self, path: &str) -> Result<Option<Observation>> {
        let key = match self.get_json(path, &[("shallow", "true")]).await? {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Object(children) => {
                match latest_key(children.keys().map(String::as_str)) {
                    Some(key) => key.to_string(),
                    None => return Ok(None),
                }
            }
            other => {
                return Err(Error::Decode(format!(
                    "Expected keyed entries under {}, got {}",
                    path, other
                )))
            }
        };

        let child = format!("{}/{}", path.trim_end_matches('/'), key);
        let payload = self.get_json(&child, &[]).await?;
        if payload.is_null() {
            // removed between the two reads
            return Ok(None);
        }

        Ok(Some(Observation::new(key, payload)))
    }

    async fn append(&self, path: &str, record: &serde_json::Value) -> Result<String> {
        let url = self.url_for(path);
        let resp = self
            .with_auth(self.http.post(&url).json(record))
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("POST {} failed: {}", path, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::StoreUnavailable(format!(
                "POST {} returned {} - {}",
                path, status, body
            )));
        }

        let pushed: PushResponse = resp
            .json()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("POST {} bad body: {}", path, e)))?;

        tracing::debug!(path = %path, key = %pushed.name, "Record appended");
        Ok(pushed.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Json;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_url_for() {
        let client = RtdbClient::new(
            "https://example-rtdb.firebaseio.com/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.url_for("/water_quality"),
            "https://example-rtdb.firebaseio.com/water_quality.json"
        );
        assert_eq!(
            client.url_for("/camera/latest/camA/"),
            "https://example-rtdb.firebaseio.com/camera/latest/camA.json"
        );
        assert_eq!(client.url_for("/"), "https://example-rtdb.firebaseio.com/.json");
    }

    /// Serve `routes` on an ephemeral port, return its base URL
    async fn serve(routes: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, routes).await.unwrap() });
        format!("http://{}", addr)
    }

    fn shallow_keys(keys: serde_json::Value) -> axum::routing::MethodRouter {
        get(move |Query(q): Query<HashMap<String, String>>| async move {
            if q.get("shallow").map(String::as_str) == Some("true") {
                Json(keys)
            } else {
                Json(serde_json::Value::Null)
            }
        })
    }

    #[tokio::test]
    async fn test_get_latest_picks_numeric_max_key() {
        let routes = axum::Router::new()
            .route(
                "/water_quality.json",
                shallow_keys(json!({"9999999999": true, "10000000000": true, "42": true})),
            )
            .route(
                "/water_quality/10000000000.json",
                get(|| async { Json(json!({"ph_value": 7.2, "tds_value": 310})) }),
            );
        let base = serve(routes).await;
        let client = RtdbClient::new(&base, None, Duration::from_secs(5)).unwrap();

        let obs = client.get_latest("/water_quality").await.unwrap().unwrap();

        assert_eq!(obs.key, "10000000000");
        assert_eq!(obs.payload["ph_value"], 7.2);
    }

    #[tokio::test]
    async fn test_get_latest_empty_path() {
        let routes = axum::Router::new().route(
            "/camera/latest/camA.json",
            get(|| async { Json(serde_json::Value::Null) }),
        );
        let base = serve(routes).await;
        let client = RtdbClient::new(&base, None, Duration::from_secs(5)).unwrap();

        assert!(client.get_latest("/camera/latest/camA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_store_unavailable() {
        let client =
            RtdbClient::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        let err = client.get_latest("/water_quality").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
