use std::collections::BTreeMap;

use serde::Serialize;

use crate::blueprint::{ParamDescriptor, RouteSpec};
use crate::registry::{MetadataRegistry, TargetId, keys};
use crate::traits::HttpMethod;

pub const OPENAPI_VERSION: &str = "3.0.0";
pub const DOCS_PATH: &str = "/api-docs";

#[derive(Debug, Clone, Serialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// Root of the generated OpenAPI document. `BTreeMap` keeps path order
/// stable between runs.
#[derive(Debug, Clone, Serialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: ApiInfo,
    pub paths: BTreeMap<String, PathItem>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
}

impl PathItem {
    fn slot_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::GET => &mut self.get,
            HttpMethod::POST => &mut self.post,
            HttpMethod::PUT => &mut self.put,
            HttpMethod::DELETE => &mut self.delete,
            HttpMethod::PATCH => &mut self.patch,
            HttpMethod::HEAD => &mut self.head,
            HttpMethod::OPTIONS => &mut self.options,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Operation {
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: &'static str,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseSpec {
    pub description: String,
}

/// Builds the OpenAPI document from the routes and bindings recorded in the
/// registry. Path parameters come from `:name` segments, query and header
/// parameters from named bindings, and a body binding becomes a JSON
/// request body. With duplicate routes the first registration wins, like
/// dispatch.
pub fn build_document(
    registry: &MetadataRegistry,
    controllers: &[TargetId],
    info: ApiInfo,
) -> OpenApiDocument {
    let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();

    for target in controllers {
        let Some(route_specs) = registry.get::<Vec<RouteSpec>>(keys::ROUTES, *target, None) else {
            continue;
        };
        for spec in route_specs {
            let mut operation = Operation {
                operation_id: Some(spec.handler_name.to_string()),
                ..Operation::default()
            };

            for segment in spec.path.split('/') {
                if let Some(name) = segment.strip_prefix(':') {
                    operation.parameters.push(Parameter {
                        name: name.to_string(),
                        location: "path",
                        required: true,
                        schema: Schema {
                            schema_type: "string",
                        },
                    });
                }
            }
            push_named_parameters(registry, *target, spec, keys::QUERY, "query", &mut operation);
            push_named_parameters(registry, *target, spec, keys::HEADERS, "header", &mut operation);

            if registry.has(keys::BODY, *target, Some(spec.handler_name)) {
                let mut content = BTreeMap::new();
                content.insert(
                    "application/json".to_string(),
                    MediaType {
                        schema: Schema {
                            schema_type: "object",
                        },
                    },
                );
                operation.request_body = Some(RequestBody {
                    required: true,
                    content,
                });
            }

            operation.responses.insert(
                "200".to_string(),
                ResponseSpec {
                    description: "Successful response".to_string(),
                },
            );

            let slot = paths
                .entry(to_doc_path(&spec.path))
                .or_default()
                .slot_mut(spec.method);
            if slot.is_none() {
                *slot = Some(operation);
            }
        }
    }

    OpenApiDocument {
        openapi: OPENAPI_VERSION.to_string(),
        info,
        paths,
    }
}

fn push_named_parameters(
    registry: &MetadataRegistry,
    target: TargetId,
    spec: &RouteSpec,
    key: &'static str,
    location: &'static str,
    operation: &mut Operation,
) {
    let Some(descriptors) =
        registry.get::<Vec<ParamDescriptor>>(key, target, Some(spec.handler_name))
    else {
        return;
    };
    for descriptor in descriptors {
        if let Some(name) = &descriptor.name {
            operation.parameters.push(Parameter {
                name: name.clone(),
                location,
                required: false,
                schema: Schema {
                    schema_type: "string",
                },
            });
        }
    }
}

/// `/users/:id` renders as `/users/{id}` in the document.
fn to_doc_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::CallArgs;
    use crate::blueprint::ControllerBlueprint;
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct UsersController;

    fn users_registry() -> (MetadataRegistry, TargetId) {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<UsersController>();
        ControllerBlueprint::<UsersController>::new()
            .path("users")
            .get("", "list", |_c: Arc<UsersController>, _args: CallArgs| {
                async move { Ok(json!([])) }
            })
            .query("list", 0, "page")
            .get(
                "/:id",
                "find",
                |_c: Arc<UsersController>, _args: CallArgs| async move { Ok(Value::Null) },
            )
            .param("find", 0, "id")
            .post("", "create", |_c: Arc<UsersController>, _args: CallArgs| {
                async move { Ok(Value::Null) }
            })
            .body("create", 0, None)
            .into_data()
            .apply(&mut registry, target)
            .unwrap();
        (registry, target)
    }

    #[test]
    fn test_document_structure() {
        let (registry, target) = users_registry();
        let document = build_document(&registry, &[target], ApiInfo::default());
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["openapi"], "3.0.0");
        assert!(value["paths"]["/users"]["get"].is_object());
        assert!(value["paths"]["/users"]["post"].is_object());
        assert!(value["paths"]["/users/{id}"]["get"].is_object());
    }

    #[test]
    fn test_path_and_query_parameters() {
        let (registry, target) = users_registry();
        let document = build_document(&registry, &[target], ApiInfo::default());
        let value = serde_json::to_value(&document).unwrap();

        let find_params = &value["paths"]["/users/{id}"]["get"]["parameters"];
        assert_eq!(find_params[0]["name"], "id");
        assert_eq!(find_params[0]["in"], "path");
        assert_eq!(find_params[0]["required"], true);

        let list_params = &value["paths"]["/users"]["get"]["parameters"];
        assert_eq!(list_params[0]["name"], "page");
        assert_eq!(list_params[0]["in"], "query");
        assert_eq!(list_params[0]["required"], false);
    }

    #[test]
    fn test_body_binding_becomes_request_body() {
        let (registry, target) = users_registry();
        let document = build_document(&registry, &[target], ApiInfo::default());
        let value = serde_json::to_value(&document).unwrap();

        let request_body = &value["paths"]["/users"]["post"]["requestBody"];
        assert_eq!(request_body["required"], true);
        assert!(request_body["content"]["application/json"].is_object());
        // The list operation has no body binding.
        assert!(value["paths"]["/users"]["get"].get("requestBody").is_none());
    }

    #[test]
    fn test_operation_ids_and_responses() {
        let (registry, target) = users_registry();
        let document = build_document(&registry, &[target], ApiInfo::default());
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["paths"]["/users"]["get"]["operationId"], "list");
        assert_eq!(
            value["paths"]["/users"]["get"]["responses"]["200"]["description"],
            "Successful response"
        );
    }

    #[test]
    fn test_doc_path_conversion() {
        assert_eq!(to_doc_path("/users/:id/posts/:post"), "/users/{id}/posts/{post}");
        assert_eq!(to_doc_path("/plain"), "/plain");
        assert_eq!(to_doc_path(""), "/");
    }
}
