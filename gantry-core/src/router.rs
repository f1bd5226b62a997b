use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::traits::HttpMethod;

/// Type-erased async route handler.
pub type HandlerFn = Arc<
    dyn Fn(HttpRequest) -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        + Send
        + Sync,
>;

pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    pub handler: HandlerFn,
}

/// Linear route table. Routes are matched in registration order and the
/// first match wins, so duplicate paths are legal and earlier registrations
/// shadow later ones.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches a request: splits off the query string, finds the first
    /// matching route, fills in path and query parameters and invokes the
    /// handler. Misses produce `Error::RouteNotFound`.
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (request.path.clone(), None),
        };
        if let Some(query) = query {
            request.query_params = parse_query_string(&query);
        }
        request.path = path.clone();

        for route in &self.routes {
            if !route.method.as_str().eq_ignore_ascii_case(&request.method) {
                continue;
            }
            if let Some(params) = match_path(&route.path, &path) {
                request.params = params;
                return (route.handler)(request).await;
            }
        }

        Err(Error::RouteNotFound(format!("{} {}", request.method, path)))
    }
}

/// Matches a path against a pattern with `:name` segments, returning the
/// captured parameters. Empty segments are ignored so trailing slashes do
/// not affect matching.
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_segment, path_segment) in pattern_segments.iter().zip(&path_segments) {
        if let Some(name) = pattern_segment.strip_prefix(':') {
            params.insert(name.to_string(), (*path_segment).to_string());
        } else if pattern_segment != path_segment {
            return None;
        }
    }
    Some(params)
}

/// Decodes `a=1&b=two` into a map. Percent escapes and `+` are decoded.
/// Repeated keys keep the last value.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_handler(text: &'static str) -> HandlerFn {
        Arc::new(move |_request: HttpRequest| {
            Box::pin(async move { Ok(HttpResponse::ok().with_text(text)) })
                as Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        })
    }

    fn param_handler(name: &'static str) -> HandlerFn {
        Arc::new(move |request: HttpRequest| {
            Box::pin(async move {
                let value = request.param(name).unwrap_or("?").to_string();
                Ok(HttpResponse::ok().with_text(value))
            })
                as Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
        })
    }

    #[test]
    fn test_match_path_exact() {
        assert!(match_path("/users", "/users").is_some());
        assert!(match_path("/users", "/orders").is_none());
    }

    #[test]
    fn test_match_path_params() {
        let params = match_path("/users/:id/posts/:post", "/users/7/posts/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
        assert_eq!(params.get("post").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_match_path_length_mismatch() {
        assert!(match_path("/users/:id", "/users").is_none());
        assert!(match_path("/users", "/users/7").is_none());
    }

    #[test]
    fn test_match_path_ignores_trailing_slash() {
        assert!(match_path("/users", "/users/").is_some());
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let params = parse_query_string("q=a%20b&page=2&flag");
        assert_eq!(params.get("q").map(String::as_str), Some("a b"));
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_route_dispatch_and_params() {
        let mut router = Router::new();
        router.add_route(Route {
            method: HttpMethod::GET,
            path: "/users/:id".to_string(),
            handler: param_handler("id"),
        });

        let response = router
            .route(HttpRequest::new("GET", "/users/99"))
            .await
            .unwrap();
        assert_eq!(response.body, b"99");
    }

    #[tokio::test]
    async fn test_route_populates_query_params() {
        let mut router = Router::new();
        router.add_route(Route {
            method: HttpMethod::GET,
            path: "/search".to_string(),
            handler: Arc::new(|request: HttpRequest| {
                Box::pin(async move {
                    let q = request.query("q").unwrap_or("").to_string();
                    Ok(HttpResponse::ok().with_text(q))
                })
                    as Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>
            }),
        });

        let response = router
            .route(HttpRequest::new("GET", "/search?q=hello"))
            .await
            .unwrap();
        assert_eq!(response.body, b"hello");
    }

    #[tokio::test]
    async fn test_method_must_match() {
        let mut router = Router::new();
        router.add_route(Route {
            method: HttpMethod::POST,
            path: "/users".to_string(),
            handler: static_handler("created"),
        });

        let result = router.route(HttpRequest::new("GET", "/users")).await;
        assert!(matches!(result, Err(Error::RouteNotFound(_))));
    }

    #[tokio::test]
    async fn test_first_match_wins_on_duplicates() {
        let mut router = Router::new();
        router.add_route(Route {
            method: HttpMethod::GET,
            path: "/dup".to_string(),
            handler: static_handler("first"),
        });
        router.add_route(Route {
            method: HttpMethod::GET,
            path: "/dup".to_string(),
            handler: static_handler("second"),
        });

        assert_eq!(router.len(), 2);
        let response = router.route(HttpRequest::new("GET", "/dup")).await.unwrap();
        assert_eq!(response.body, b"first");
    }

    #[tokio::test]
    async fn test_miss_is_route_not_found() {
        let router = Router::new();
        let result = router.route(HttpRequest::new("GET", "/nowhere")).await;
        match result {
            Err(Error::RouteNotFound(message)) => assert!(message.contains("/nowhere")),
            other => panic!("expected RouteNotFound, got {other:?}"),
        }
    }
}
