//! HTTP client: the single outbound pipeline for API calls
//!
//! Every request goes through the same steps: attach the bearer token, send,
//! unwrap the response envelope. A 401 on a first attempt triggers one silent
//! token refresh followed by exactly one resubmission.

use crate::error::{ClientError, Result};
use crate::session::SessionStore;
use crate::types;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a logical request is in its refresh-and-retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// Resubmitted after a token refresh; a further 401 is final
    Retried,
}

/// Method, path, query, headers and body of one logical API call.
/// Kept intact so it can be resubmitted after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// API client bound to a session
#[derive(Clone)]
pub struct HttpClient {
    session: Arc<SessionStore>,
    http_client: Client,
}

impl HttpClient {
    pub fn new(session: Arc<SessionStore>) -> Result<Self> {
        let http_client = Client::builder().timeout(session.config().request_timeout).build()?;
        Ok(Self { session, http_client })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut request = ApiRequest::new(Method::GET, path);
        request.query = query_pairs(query)?;
        self.execute(request).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::new(Method::POST, path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::new(Method::PUT, path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Send a request through the pipeline and decode its payload
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.execute_raw(&request).await?;
        types::unwrap_body(body)
    }

    /// Send a request and return its successful body, refreshing once on 401
    async fn execute_raw(&self, request: &ApiRequest) -> Result<Value> {
        let mut attempt = Attempt::First;
        let mut token = self.session.access_token();

        loop {
            let response = self.dispatch(request, token.as_deref()).await?;
            let status = response.status();

            if status != StatusCode::UNAUTHORIZED {
                return self.read_body(response).await;
            }

            let message = types::failure_message(&self.read_bytes(response).await?);
            if attempt == Attempt::Retried || !self.session.has_refresh_token() {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    ?attempt,
                    "Unauthorized, not retrying"
                );
                return Err(ClientError::Unauthorized { message });
            }

            attempt = Attempt::Retried;
            debug!(
                method = %request.method,
                path = %request.path,
                "Unauthorized, refreshing tokens"
            );

            match self.session.refresh_tokens().await {
                Ok(pair) => token = Some(pair.access_token),
                Err(refresh_err) => {
                    warn!(error = %refresh_err, "Token refresh failed, ending session");
                    if let Err(e) = self.session.logout() {
                        warn!(error = %e, "Failed to clear persisted tokens");
                    }
                    return Err(refresh_err);
                }
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = self.session.config().url(&request.path);
        let mut headers = request.headers.clone();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, bearer(token)?);
        }

        let mut builder = self.http_client.request(request.method.clone(), &url).headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            url = %url,
            authenticated = token.is_some(),
            "Sending request"
        );
        builder
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, self.session.config().request_timeout))
    }

    async fn read_bytes(&self, response: Response) -> Result<Vec<u8>> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_transport(e, self.session.config().request_timeout))?;
        Ok(bytes.to_vec())
    }

    async fn read_body(&self, response: Response) -> Result<Value> {
        let status = response.status();
        let bytes = self.read_bytes(response).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: types::failure_message(&bytes),
            });
        }
        types::parse_body(&bytes)
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ClientError::Decode("access token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn query_pairs<Q: Serialize + ?Sized>(query: &Q) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(query)?;
    let Value::Object(map) = value else {
        return Err(ClientError::Configuration(
            "query parameters must serialize to an object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct AuditQuery {
        page: u32,
        size: u32,
        username: Option<String>,
        action: Option<String>,
    }

    #[test]
    fn test_query_pairs_skip_nulls() {
        let pairs = query_pairs(&AuditQuery {
            page: 0,
            size: 20,
            username: Some("alice".into()),
            action: None,
        })
        .unwrap();

        assert!(pairs.contains(&("page".to_string(), "0".to_string())));
        assert!(pairs.contains(&("size".to_string(), "20".to_string())));
        assert!(pairs.contains(&("username".to_string(), "alice".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "action"));
    }

    #[test]
    fn test_query_pairs_reject_scalars() {
        assert!(matches!(query_pairs(&42), Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_api_request_builder() {
        let request = ApiRequest::new(Method::POST, "/inventory/checkout")
            .query("dryRun", true)
            .json(&json!({"assetId": 3, "userId": 9}))
            .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("dryRun".to_string(), "true".to_string())]);
        assert_eq!(request.body, Some(json!({"assetId": 3, "userId": 9})));
    }

    #[test]
    fn test_bearer_header() {
        let value = bearer("abc.def.ghi").unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer abc.def.ghi");
        assert!(value.is_sensitive());
        assert!(bearer("bad\ntoken").is_err());
    }
}
