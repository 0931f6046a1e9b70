/// Request dispatcher.
///
/// Maps a decoded [`Request`] to a [`Response`]. Listing methods are served
/// straight from the registry; `tools/call` and `resources/read` validate
/// their arguments on the calling thread and then run the handler through
/// the task bridge (or directly, for handlers marked as not host-bound).

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::core::bridge::TaskBridge;
use crate::core::error::{FailureCategory, RpcError, TaskFailure};
use crate::core::host::panic_message;
use crate::core::protocol::{JSONRPC_VERSION, MCP_PROTOCOL_VERSION, Request, Response};
use crate::core::registry::{Category, HandlerDescriptor, Registry};
use crate::core::schema::ParameterSchema;
use crate::core::uri::ResourceUri;

/// Name and version reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Parameters for tools/call
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Parameters for resources/read. Members besides `uri` are passed to the
/// handler as arguments.
#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Routes MCP methods to built-in answers or registered handlers.
///
/// Shared by all listener workers; every method takes `&self`.
pub struct Dispatcher {
    /// Frozen handler catalog
    registry: Arc<Registry>,
    /// Route to the host thread for host-bound handlers
    bridge: TaskBridge,
    info: ServerInfo,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher. The registry cannot change afterwards.
    ///
    /// # Arguments
    /// * `registry` - Fully populated registry; frozen from here on
    /// * `bridge` - Route to the host thread
    /// * `info` - Server name and version for `initialize`
    /// * `call_timeout` - How long a caller waits for host-bound handlers
    pub fn new(
        registry: Registry,
        bridge: TaskBridge,
        info: ServerInfo,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            bridge,
            info,
            call_timeout,
        }
    }

    /// Handler catalog, read-only.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Handle one request. Returns `None` for notifications.
    ///
    /// Never panics on bad input: protocol, validation and handler failures
    /// all come back as error responses. Host-bound handlers block this
    /// thread until the host loop answers or the call timeout passes.
    pub fn handle(&self, request: Request) -> Option<Response> {
        debug!(method = %request.method, id = ?request.id, "dispatching");
        let outcome = self.dispatch(&request);

        if let Err(e) = &outcome {
            match e {
                RpcError::Execution(_) | RpcError::Timeout(_) | RpcError::Unavailable(_) => {
                    warn!(method = %request.method, error = %e, "request failed")
                }
                _ => debug!(method = %request.method, error = %e, "request rejected"),
            }
        }

        let id = request.id?;
        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(e) => Response::error(id, &e),
        })
    }

    fn dispatch(&self, request: &Request) -> Result<Value, RpcError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::UnsupportedVersion(request.jsonrpc.clone()));
        }

        match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" | "notifications/initialized" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.call_tool(&request.params),
            "resources/list" => Ok(json!({
                "resources": listing(self.registry.fixed_resources())
            })),
            "resources/templates/list" => Ok(json!({
                "resourceTemplates": listing(self.registry.resource_templates())
            })),
            "resources/read" => self.read_resource(&request.params),
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version
            }
        })
    }

    /// `tools/list` payload. Also served on `GET /tools`.
    pub fn tools_list(&self) -> Value {
        json!({ "tools": listing(self.registry.list(Category::Tool)) })
    }

    fn call_tool(&self, params: &Value) -> Result<Value, RpcError> {
        let params: ToolCallParams = parse_params(params)?;

        // Resources share the namespace but cannot be called as tools
        let descriptor = self
            .registry
            .lookup(&params.name)
            .ok()
            .filter(|d| d.category() == Category::Tool)
            .ok_or_else(|| RpcError::ToolNotFound(params.name.clone()))?;

        let arguments = match params.arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        // Validate on this thread so bad input never reaches the host
        descriptor.schema().validate(&arguments)?;
        self.invoke(descriptor, arguments)
    }

    fn read_resource(&self, params: &Value) -> Result<Value, RpcError> {
        let params: ReadResourceParams = parse_params(params)?;
        let uri = ResourceUri::parse(&params.uri)
            .ok_or_else(|| {
                RpcError::InvalidParams(format!("invalid resource uri: {}", params.uri))
            })?;
        let found = self
            .registry
            .resolve_resource(&uri)
            .ok_or_else(|| RpcError::ResourceNotFound(params.uri.clone()))?;

        let schema = found.descriptor.schema();
        let arguments = resource_arguments(schema, &uri, &found.bindings, params.extra);
        schema.validate(&arguments)?;
        self.invoke(found.descriptor, arguments)
    }

    fn invoke(&self, descriptor: &HandlerDescriptor, arguments: Value) -> Result<Value, RpcError> {
        if descriptor.is_host_bound() {
            let handler = descriptor.handler();
            let value = self
                .bridge
                .submit(move || handler(arguments), self.call_timeout)?;
            return Ok(value);
        }

        // Direct handlers run here, so contain their panics the same way the
        // host pump does.
        match panic::catch_unwind(AssertUnwindSafe(|| descriptor.invoke(arguments))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RpcError::Execution(TaskFailure {
                category: FailureCategory::Handler,
                message: e.to_string(),
            })),
            Err(payload) => Err(RpcError::Execution(TaskFailure {
                category: FailureCategory::Panic,
                message: panic_message(payload.as_ref()),
            })),
        }
    }
}

fn listing<'a>(descriptors: impl Iterator<Item = &'a HandlerDescriptor>) -> Vec<Value> {
    descriptors.map(HandlerDescriptor::to_listing).collect()
}

fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    if params.is_null() {
        return Err(RpcError::InvalidParams("missing params".into()));
    }
    serde_json::from_value(params.clone()).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

/// Build the argument object for a resource handler.
///
/// Sources, lowest precedence first: extra `params` members, URI query
/// parameters, template path bindings. URI values arrive as strings and are
/// converted to the declared parameter type when they parse.
fn resource_arguments(
    schema: &ParameterSchema,
    uri: &ResourceUri,
    bindings: &BTreeMap<String, String>,
    extra: Map<String, Value>,
) -> Value {
    let mut arguments = extra;
    let from_uri = uri
        .query()
        .iter()
        .map(|(k, v)| (k, v))
        .chain(bindings.iter());
    for (name, raw) in from_uri {
        let value = schema
            .get(name)
            .and_then(|p| p.kind.coerce(raw))
            .unwrap_or_else(|| Value::String(raw.clone()));
        arguments.insert(name.clone(), value);
    }
    Value::Object(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{HandlerError, codes};
    use crate::core::host::HostLoop;
    use crate::core::schema::Property;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(HandlerDescriptor::tool(
                "add",
                "Add two numbers",
                ParameterSchema::new()
                    .property("a", Property::integer("First"))
                    .property("b", Property::integer("Second"))
                    .require("a")
                    .require("b"),
                |args| {
                    let a = args["a"].as_i64().unwrap_or_default();
                    let b = args["b"].as_i64().unwrap_or_default();
                    Ok(json!(a + b))
                },
            ))
            .unwrap();
        registry
            .register(
                HandlerDescriptor::tool("fail", "Always fails", ParameterSchema::new(), |_| {
                    Err(HandlerError::new("no active document"))
                })
                .direct(),
            )
            .unwrap();
        registry
            .register(HandlerDescriptor::resource(
                "status",
                "demo://status",
                "Status",
                |_| Ok(json!({"status": "running"})),
            ))
            .unwrap();
        registry
            .register(
                HandlerDescriptor::resource_template(
                    "snapshot",
                    "host://snapshot{?view,width}",
                    "Viewport",
                    |args| Ok(args),
                )
                .unwrap()
                .with_schema(
                    ParameterSchema::new()
                        .property("view", Property::string("Camera"))
                        .property("width", Property::integer("Width").range(1.0, 4096.0)),
                ),
            )
            .unwrap();
        registry
    }

    fn dispatcher() -> (Dispatcher, HostLoop) {
        let (bridge, host) = HostLoop::spawn(Duration::from_millis(5)).unwrap();
        let info = ServerInfo {
            name: "test".into(),
            version: "0.0.0".into(),
        };
        (
            Dispatcher::new(registry(), bridge, info, Duration::from_secs(5)),
            host,
        )
    }

    fn call(d: &Dispatcher, method: &str, params: Value) -> Response {
        d.handle(Request::new(1, method, params)).unwrap()
    }

    #[test]
    fn add_runs_on_host_and_returns_sum() {
        let (d, host) = dispatcher();
        let resp = call(&d, "tools/call", json!({"name": "add", "arguments": {"a": 2, "b": 3}}));
        assert_eq!(resp.result(), Some(&json!(5)));
        host.stop();
    }

    #[test]
    fn unknown_tool_and_missing_argument() {
        let (d, host) = dispatcher();
        let resp = call(&d, "tools/call", json!({"name": "nope", "arguments": {}}));
        assert_eq!(resp.error_object().unwrap().code, codes::METHOD_NOT_FOUND);

        let resp = call(&d, "tools/call", json!({"name": "add", "arguments": {"a": 2}}));
        let err = resp.error_object().unwrap();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.contains("missing required parameter: b"));
        host.stop();
    }

    #[test]
    fn handler_error_becomes_internal_error() {
        let (d, host) = dispatcher();
        let resp = call(&d, "tools/call", json!({"name": "fail"}));
        let err = resp.error_object().unwrap();
        assert_eq!(err.code, codes::INTERNAL_ERROR);
        assert_eq!(err.message, "Execution error: handler error: no active document");
        host.stop();
    }

    #[test]
    fn resources_cannot_be_called_as_tools() {
        let (d, host) = dispatcher();
        let resp = call(&d, "tools/call", json!({"name": "status"}));
        assert_eq!(resp.error_object().unwrap().code, codes::METHOD_NOT_FOUND);
        host.stop();
    }

    #[test]
    fn read_fixed_resource() {
        let (d, host) = dispatcher();
        let resp = call(&d, "resources/read", json!({"uri": "demo://status"}));
        assert_eq!(resp.result(), Some(&json!({"status": "running"})));
        host.stop();
    }

    #[test]
    fn template_arguments_are_coerced_and_validated() {
        let (d, host) = dispatcher();
        let resp = call(
            &d,
            "resources/read",
            json!({"uri": "host://snapshot?view=top&width=640"}),
        );
        assert_eq!(resp.result(), Some(&json!({"view": "top", "width": 640})));

        let resp = call(&d, "resources/read", json!({"uri": "host://snapshot?width=wide"}));
        assert_eq!(resp.error_object().unwrap().code, codes::INVALID_PARAMS);

        let resp = call(&d, "resources/read", json!({"uri": "host://unknown"}));
        assert_eq!(resp.error_object().unwrap().code, codes::METHOD_NOT_FOUND);
        host.stop();
    }

    #[test]
    fn listings_are_stable_and_split_by_kind() {
        let (d, host) = dispatcher();
        let first = call(&d, "tools/list", Value::Null);
        let second = call(&d, "tools/list", Value::Null);
        assert_eq!(first, second);
        let names: Vec<_> = first.result().unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["add", "fail"]);

        let resources = call(&d, "resources/list", Value::Null);
        assert_eq!(
            resources.result().unwrap()["resources"][0]["uri"],
            "demo://status"
        );
        let templates = call(&d, "resources/templates/list", Value::Null);
        assert_eq!(
            templates.result().unwrap()["resourceTemplates"][0]["uriTemplate"],
            "host://snapshot{?view,width}"
        );
        host.stop();
    }

    #[test]
    fn protocol_errors() {
        let (d, host) = dispatcher();
        let resp = call(&d, "prompts/list", Value::Null);
        assert_eq!(resp.error_object().unwrap().code, codes::METHOD_NOT_FOUND);

        let mut old = Request::new("x", "tools/list", Value::Null);
        old.jsonrpc = "1.0".into();
        let resp = d.handle(old).unwrap();
        assert_eq!(resp.id(), &json!("x"));
        assert_eq!(resp.error_object().unwrap().code, codes::INVALID_REQUEST);
        host.stop();
    }

    #[test]
    fn notifications_get_no_response() {
        let (d, host) = dispatcher();
        let mut note = Request::new(0, "notifications/initialized", Value::Null);
        note.id = None;
        assert!(d.handle(note).is_none());
        host.stop();
    }

    #[test]
    fn initialize_reports_server_info() {
        let (d, host) = dispatcher();
        let resp = call(&d, "initialize", json!({}));
        let result = resp.result().unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "test");
        host.stop();
    }
}
