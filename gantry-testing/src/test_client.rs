use std::collections::HashMap;
use std::sync::Arc;

use gantry_core::http::{HttpRequest, HttpResponse};
use gantry_core::router::Router;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Drives requests through a router in-process, no socket involved.
///
/// Dispatch behaves exactly like the served application: routing misses
/// come back as the JSON error payload, in development mode (traces kept).
#[derive(Clone)]
pub struct TestClient {
    router: Arc<Router>,
}

impl TestClient {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(HttpRequest::new("GET", path)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(HttpRequest::new("DELETE", path)).await
    }

    pub async fn post(&self, path: &str, body: &impl Serialize) -> TestResponse {
        self.send_json("POST", path, body).await
    }

    pub async fn put(&self, path: &str, body: &impl Serialize) -> TestResponse {
        self.send_json("PUT", path, body).await
    }

    pub async fn patch(&self, path: &str, body: &impl Serialize) -> TestResponse {
        self.send_json("PATCH", path, body).await
    }

    async fn send_json(&self, method: &str, path: &str, body: &impl Serialize) -> TestResponse {
        let request = HttpRequest::new(method, path)
            .with_json(body)
            .expect("request body failed to serialize");
        self.send(request).await
    }

    /// Sends an arbitrary request, for custom headers or raw bodies.
    pub async fn send(&self, request: HttpRequest) -> TestResponse {
        let response = match self.router.route(request).await {
            Ok(response) => response,
            Err(error) => HttpResponse::from_error(&error, false),
        };
        TestResponse::from(response)
    }
}

/// A dispatched response plus assertion helpers.
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl From<HttpResponse> for TestResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

impl TestResponse {
    /// Deserializes the body, panicking with the raw payload on failure so
    /// the test output shows what actually came back.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap_or_else(|error| {
            panic!(
                "response body is not the expected JSON ({error}): {}",
                self.text()
            )
        })
    }

    pub fn value(&self) -> Value {
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str).or_else(|| {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status, expected,
            "unexpected status, body: {}",
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(200)
    }

    /// Asserts one field of a JSON body by pointer (`/items/0/name`).
    pub fn assert_json_field(&self, pointer: &str, expected: impl Into<Value>) -> &Self {
        let value = self.value();
        assert_eq!(
            value.pointer(pointer),
            Some(&expected.into()),
            "field {pointer} mismatch in {value}"
        );
        self
    }
}
