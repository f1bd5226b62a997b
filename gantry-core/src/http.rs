use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;

/// A request after it has been lifted off the wire: route params and query
/// params are filled in by the router before dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            params: HashMap::new(),
            query_params: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(mut self, value: &impl Serialize) -> Result<Self, Error> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Case-insensitive header lookup. Hyper lowercases names on ingest but
    /// hand-built requests in tests may not.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str).or_else(|| {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Decodes the body by content type: JSON as-is, form bodies as an
    /// object of string fields, anything else as a string. An empty body
    /// is `null` so bodiless requests bind cleanly.
    pub fn parsed_body(&self) -> Result<Value, Error> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        let content_type = self.header("content-type").unwrap_or("");
        if content_type.starts_with("application/json") {
            return serde_json::from_slice(&self.body)
                .map_err(|e| Error::Deserialization(format!("invalid json body: {e}")));
        }
        if content_type.starts_with("application/x-www-form-urlencoded") {
            let fields: HashMap<String, String> = serde_urlencoded::from_bytes(&self.body)
                .map_err(|e| Error::Deserialization(format!("invalid form body: {e}")))?;
            return Ok(Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ));
        }
        Ok(Value::String(
            String::from_utf8_lossy(&self.body).into_owned(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_json(mut self, value: &impl Serialize) -> Result<Self, Error> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = text.into().into_bytes();
        self.headers
            .insert("content-type".to_string(), "text/plain".to_string());
        self
    }

    /// Renders an error the way dispatch does: mapped status plus the JSON
    /// error payload, trace withheld in production.
    pub fn from_error(error: &Error, production: bool) -> Self {
        let body = error.to_body(production);
        Self::new(error.status_code())
            .with_json(&body)
            .unwrap_or_else(|_| Self::new(500))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest::new("GET", "/").with_header("Authorization", "Bearer x");
        assert_eq!(request.header("authorization"), Some("Bearer x"));
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer x"));
        assert_eq!(request.header("x-missing"), None);
    }

    #[test]
    fn test_empty_body_parses_to_null() {
        let request = HttpRequest::new("GET", "/");
        assert_eq!(request.parsed_body().unwrap(), Value::Null);
    }

    #[test]
    fn test_json_body_parses_by_content_type() {
        let request = HttpRequest::new("POST", "/")
            .with_json(&json!({"name": "gantry"}))
            .unwrap();
        assert_eq!(request.parsed_body().unwrap()["name"], "gantry");
    }

    #[test]
    fn test_invalid_json_body_is_rejected() {
        let request = HttpRequest::new("POST", "/")
            .with_header("content-type", "application/json")
            .with_body("{nope");
        assert!(matches!(
            request.parsed_body(),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_form_body_becomes_object() {
        let request = HttpRequest::new("POST", "/")
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=ada&role=engineer");
        let parsed = request.parsed_body().unwrap();
        assert_eq!(parsed["name"], "ada");
        assert_eq!(parsed["role"], "engineer");
    }

    #[test]
    fn test_plain_body_becomes_string() {
        let request = HttpRequest::new("POST", "/")
            .with_header("content-type", "text/plain")
            .with_body("hello");
        assert_eq!(request.parsed_body().unwrap(), Value::String("hello".into()));
    }

    #[test]
    fn test_response_builders() {
        let response = HttpResponse::ok()
            .with_json(&json!({"ok": true}))
            .unwrap()
            .with_header("x-request-id", "abc");
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        let value: Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_error_response_shape() {
        let error = Error::status(404, "missing thing");
        let response = HttpResponse::from_error(&error, true);
        assert_eq!(response.status, 404);
        let value: Value = response.json().unwrap();
        assert_eq!(value["message"], "missing thing");
        assert!(value.get("stack").is_none());
    }
}
