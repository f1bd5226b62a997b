use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::blueprint::{ParamDescriptor, ParamKind};
use crate::http::HttpRequest;
use crate::registry::{MetadataRegistry, TargetId};

/// One bound handler argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// Parsed body, or a single field of it.
    Json(Value),
    /// A single path, query or header value.
    Text(String),
    /// A whole parameter map, used when a binding carries no name or the
    /// named entry is absent.
    Map(HashMap<String, String>),
    Request(HttpRequest),
    Response(ResponseHandle),
}

/// Positional handler arguments. Slots a handler never bound are `None`,
/// and indices may be sparse; the vector is as long as the highest bound
/// index plus one.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    slots: Vec<Option<ArgValue>>,
}

impl CallArgs {
    pub fn place(&mut self, index: usize, value: ArgValue) {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(value);
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn json(&self, index: usize) -> Option<&Value> {
        match self.get(index) {
            Some(ArgValue::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Some(ArgValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn map(&self, index: usize) -> Option<&HashMap<String, String>> {
        match self.get(index) {
            Some(ArgValue::Map(map)) => Some(map),
            _ => None,
        }
    }

    pub fn request(&self, index: usize) -> Option<&HttpRequest> {
        match self.get(index) {
            Some(ArgValue::Request(request)) => Some(request),
            _ => None,
        }
    }

    pub fn response(&self, index: usize) -> Option<&ResponseHandle> {
        match self.get(index) {
            Some(ArgValue::Response(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Default)]
struct Overrides {
    status: Option<u16>,
    headers: Vec<(String, String)>,
}

/// Lets a handler override the response status or add headers without
/// building the response itself. Overrides are merged after the handler
/// returns and take precedence over the `statusCode` body convention.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    overrides: Arc<Mutex<Overrides>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: u16) {
        self.overrides.lock().unwrap().status = Some(status);
    }

    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.overrides
            .lock()
            .unwrap()
            .headers
            .push((name.into(), value.into()));
    }

    pub fn status(&self) -> Option<u16> {
        self.overrides.lock().unwrap().status
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        self.overrides.lock().unwrap().headers.clone()
    }
}

/// Kinds in evaluation order. Later kinds win when two bindings share an
/// index.
const BINDING_ORDER: [ParamKind; 6] = [
    ParamKind::Body,
    ParamKind::Query,
    ParamKind::Param,
    ParamKind::Headers,
    ParamKind::Request,
    ParamKind::Response,
];

/// Assembles the positional arguments for one handler invocation from the
/// descriptors recorded for `(target, handler)`.
///
/// Named bindings extract a single entry and fall back to the whole
/// structure when the name is absent. Binding never fails: unknown names
/// degrade to maps and unbound slots stay `None`.
pub fn build_arguments(
    registry: &MetadataRegistry,
    target: TargetId,
    handler: &str,
    request: &HttpRequest,
    body: &Value,
    response: &ResponseHandle,
) -> CallArgs {
    let mut args = CallArgs::default();
    for kind in BINDING_ORDER {
        let Some(descriptors) =
            registry.get::<Vec<ParamDescriptor>>(kind.registry_key(), target, Some(handler))
        else {
            continue;
        };
        for descriptor in descriptors {
            let name = descriptor.name.as_deref();
            let value = match kind {
                ParamKind::Body => ArgValue::Json(extract_body_field(body, name)),
                ParamKind::Query => bind_from_map(&request.query_params, name),
                ParamKind::Param => bind_from_map(&request.params, name),
                ParamKind::Headers => bind_header(request, name),
                ParamKind::Request => ArgValue::Request(request.clone()),
                ParamKind::Response => ArgValue::Response(response.clone()),
            };
            args.place(descriptor.index, value);
        }
    }
    args
}

fn extract_body_field(body: &Value, name: Option<&str>) -> Value {
    match name.and_then(|field| body.get(field)) {
        Some(field_value) => field_value.clone(),
        None => body.clone(),
    }
}

fn bind_from_map(map: &HashMap<String, String>, name: Option<&str>) -> ArgValue {
    match name.and_then(|key| map.get(key)) {
        Some(value) => ArgValue::Text(value.clone()),
        None => ArgValue::Map(map.clone()),
    }
}

fn bind_header(request: &HttpRequest, name: Option<&str>) -> ArgValue {
    match name.and_then(|key| request.header(key)) {
        Some(value) => ArgValue::Text(value.to_string()),
        None => ArgValue::Map(request.headers.clone()),
    }
}
