/// Handler registry.
///
/// Built once at startup, then frozen behind an `Arc` and shared with every
/// worker. Iteration order is registration order, so listings are stable
/// across calls.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::core::error::{HandlerError, RegistryError};
use crate::core::schema::ParameterSchema;
use crate::core::uri::{ResourceUri, UriTemplate};

/// Handler callable. Receives the validated argument object.
///
/// Shared between the host thread and, for direct handlers, any worker.
pub type HandlerFn = Arc<dyn Fn(Value) -> Result<Value, HandlerError> + Send + Sync>;

/// Which MCP listing a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Called through `tools/call`.
    Tool,
    /// Read through `resources/read`.
    Resource,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => f.write_str("tool"),
            Self::Resource => f.write_str("resource"),
        }
    }
}

/// Where a resource lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// Exact URI, e.g. `server://status`.
    Fixed(String),
    /// URI template, e.g. `host://snapshot{?view,width,height}`.
    Template(UriTemplate),
}

/// Tool or resource. A resource always carries its address, so a
/// descriptor cannot describe a resource nobody can reach.
#[derive(Debug, Clone)]
enum Kind {
    Tool,
    Resource { address: ResourceAddress },
}

/// MIME type reported for every resource.
const RESOURCE_MIME_TYPE: &str = "application/json";

/// Registry entry: metadata plus the callable.
///
/// Built with [`tool`](Self::tool), [`resource`](Self::resource) or
/// [`resource_template`](Self::resource_template) and immutable once
/// registered.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    description: String,
    schema: ParameterSchema,
    kind: Kind,
    invoke: HandlerFn,
    host_bound: bool,
}

impl HandlerDescriptor {
    fn build<F>(kind: Kind, name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema: ParameterSchema::new(),
            kind,
            invoke: Arc::new(handler),
            // Handlers must opt out of the host thread explicitly.
            host_bound: true,
        }
    }

    /// A tool. Runs on the host thread unless [`direct`](Self::direct) is set.
    ///
    /// # Arguments
    /// * `name` - Unique handler name, used by `tools/call`
    /// * `description` - Human-readable summary shown in `tools/list`
    /// * `schema` - Accepted arguments; checked before the handler runs
    /// * `handler` - The callable
    pub fn tool<F>(name: &str, description: &str, schema: ParameterSchema, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        Self::build(Kind::Tool, name, description, handler).with_schema(schema)
    }

    /// A resource at a fixed URI, served as `application/json`.
    ///
    /// # Arguments
    /// * `name` - Unique handler name
    /// * `uri` - Exact URI clients pass to `resources/read`
    /// * `description` - Human-readable summary shown in `resources/list`
    /// * `handler` - The callable; receives the URI query parameters
    pub fn resource<F>(name: &str, uri: &str, description: &str, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let address = ResourceAddress::Fixed(uri.to_string());
        Self::build(Kind::Resource { address }, name, description, handler)
    }

    /// A resource addressed by a URI template.
    ///
    /// Fails with [`RegistryError::InvalidTemplate`] when `template` does not
    /// parse.
    pub fn resource_template<F>(
        name: &str,
        template: &str,
        description: &str,
        handler: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let address = ResourceAddress::Template(UriTemplate::parse(template)?);
        Ok(Self::build(Kind::Resource { address }, name, description, handler))
    }

    /// Replace the parameter schema. Resources start with an empty,
    /// non-strict schema.
    pub fn with_schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Call the handler on the listener thread instead of the host thread.
    /// Only for handlers that never touch host state.
    pub fn direct(mut self) -> Self {
        self.host_bound = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Schema the arguments are validated against.
    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn category(&self) -> Category {
        match self.kind {
            Kind::Tool => Category::Tool,
            Kind::Resource { .. } => Category::Resource,
        }
    }

    /// Whether calls go through the task bridge.
    pub fn is_host_bound(&self) -> bool {
        self.host_bound
    }

    /// Address of a resource; `None` for tools.
    pub fn address(&self) -> Option<&ResourceAddress> {
        match &self.kind {
            Kind::Tool => None,
            Kind::Resource { address } => Some(address),
        }
    }

    /// MIME type of a resource; `None` for tools.
    pub fn mime_type(&self) -> Option<&str> {
        self.address().map(|_| RESOURCE_MIME_TYPE)
    }

    /// Shared handle to the callable, for moving into a bridge task.
    pub fn handler(&self) -> HandlerFn {
        Arc::clone(&self.invoke)
    }

    /// Call the handler on the current thread.
    pub fn invoke(&self, args: Value) -> Result<Value, HandlerError> {
        (self.invoke)(args)
    }

    /// Entry as it appears in `tools/list`, `resources/list` or
    /// `resources/templates/list`.
    pub fn to_listing(&self) -> Value {
        let address = match &self.kind {
            Kind::Tool => {
                return json!({
                    "name": self.name,
                    "description": self.description,
                    "inputSchema": self.schema.to_json()
                });
            }
            Kind::Resource { address } => address,
        };

        let mut out = Map::new();
        match address {
            ResourceAddress::Fixed(uri) => out.insert("uri".into(), json!(uri)),
            ResourceAddress::Template(t) => out.insert("uriTemplate".into(), json!(t.as_str())),
        };
        out.insert("name".into(), json!(self.name));
        if !self.description.is_empty() {
            out.insert("description".into(), json!(self.description));
        }
        out.insert("mimeType".into(), json!(RESOURCE_MIME_TYPE));
        Value::Object(out)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("host_bound", &self.host_bound)
            .finish_non_exhaustive()
    }
}

/// A resource found for a URI, with the template bindings if it was
/// matched through a template.
#[derive(Debug)]
pub struct ResourceMatch<'a> {
    pub descriptor: &'a HandlerDescriptor,
    pub bindings: BTreeMap<String, String>,
}

/// Name-keyed catalog of tool and resource handlers.
///
/// Populated before the listener starts, then moved into an `Arc` and only
/// read, so lookups need no locking.
#[derive(Debug, Default)]
pub struct Registry {
    /// Descriptors in registration order (for listings)
    entries: Vec<HandlerDescriptor>,
    /// Name to position in `entries` (for calls)
    index: HashMap<String, usize>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler.
    ///
    /// Tools and resources share one namespace, so a resource cannot reuse a
    /// tool's name.
    ///
    /// # Arguments
    /// * `descriptor` - Handler metadata and callable
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateName(descriptor.name().to_string()));
        }
        debug!(name = descriptor.name(), category = %descriptor.category(), "registered handler");
        self.index
            .insert(descriptor.name().to_string(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    /// Find a handler by name, whatever its category.
    pub fn lookup(&self, name: &str) -> Result<&HandlerDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Descriptors of one category in registration order. The iterator can
    /// be cloned to walk the list again.
    pub fn list(
        &self,
        category: Category,
    ) -> impl Iterator<Item = &HandlerDescriptor> + Clone + '_ {
        self.entries.iter().filter(move |d| d.category() == category)
    }

    /// Resources with a fixed URI.
    pub fn fixed_resources(&self) -> impl Iterator<Item = &HandlerDescriptor> + Clone + '_ {
        self.list(Category::Resource)
            .filter(|d| matches!(d.address(), Some(ResourceAddress::Fixed(_))))
    }

    /// Resources addressed by a template.
    pub fn resource_templates(&self) -> impl Iterator<Item = &HandlerDescriptor> + Clone + '_ {
        self.list(Category::Resource)
            .filter(|d| matches!(d.address(), Some(ResourceAddress::Template(_))))
    }

    /// Find the resource serving `uri`: an exact URI match first, then the
    /// first matching template in registration order.
    pub fn resolve_resource(&self, uri: &ResourceUri) -> Option<ResourceMatch<'_>> {
        let exact = self.fixed_resources().find(|d| {
            matches!(d.address(), Some(ResourceAddress::Fixed(fixed))
                if fixed == uri.as_str() || fixed == uri.base())
        });
        if let Some(descriptor) = exact {
            return Some(ResourceMatch {
                descriptor,
                bindings: BTreeMap::new(),
            });
        }

        self.resource_templates().find_map(|d| match d.address() {
            Some(ResourceAddress::Template(template)) => {
                template.matches(uri).map(|bindings| ResourceMatch {
                    descriptor: d,
                    bindings,
                })
            }
            _ => None,
        })
    }

    /// Number of registered handlers of both categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Property;

    fn echo(args: Value) -> Result<Value, HandlerError> {
        Ok(args)
    }

    fn sample() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(HandlerDescriptor::tool(
                "b_tool",
                "second",
                ParameterSchema::new(),
                echo,
            ))
            .unwrap();
        registry
            .register(HandlerDescriptor::resource(
                "status",
                "demo://status",
                "status",
                echo,
            ))
            .unwrap();
        registry
            .register(HandlerDescriptor::tool(
                "a_tool",
                "first",
                ParameterSchema::new().property("x", Property::integer("x")),
                echo,
            ))
            .unwrap();
        registry
            .register(
                HandlerDescriptor::resource_template(
                    "snapshot",
                    "host://snapshot{?view}",
                    "viewport",
                    echo,
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = sample();
        let err = registry
            .register(HandlerDescriptor::tool("a_tool", "again", ParameterSchema::new(), echo))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("a_tool".into()));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn lookup_finds_registered_and_reports_missing() {
        let registry = sample();
        assert_eq!(registry.lookup("a_tool").unwrap().description(), "first");
        assert_eq!(
            registry.lookup("nope").unwrap_err(),
            RegistryError::NotFound("nope".into())
        );
    }

    #[test]
    fn list_keeps_registration_order_and_is_restartable() {
        let registry = sample();
        let tools = registry.list(Category::Tool);
        let first: Vec<_> = tools.clone().map(HandlerDescriptor::name).collect();
        let second: Vec<_> = tools.map(HandlerDescriptor::name).collect();
        assert_eq!(first, vec!["b_tool", "a_tool"]);
        assert_eq!(first, second);

        let resources: Vec<_> = registry
            .list(Category::Resource)
            .map(HandlerDescriptor::name)
            .collect();
        assert_eq!(resources, vec!["status", "snapshot"]);
    }

    #[test]
    fn resolves_exact_then_template() {
        let registry = sample();
        let exact = registry
            .resolve_resource(&ResourceUri::parse("demo://status").unwrap())
            .unwrap();
        assert_eq!(exact.descriptor.name(), "status");

        let templated = registry
            .resolve_resource(&ResourceUri::parse("host://snapshot?view=top").unwrap())
            .unwrap();
        assert_eq!(templated.descriptor.name(), "snapshot");

        assert!(
            registry
                .resolve_resource(&ResourceUri::parse("demo://missing").unwrap())
                .is_none()
        );
    }

    #[test]
    fn listings_use_mcp_field_names() {
        let registry = sample();
        let tool = registry.lookup("a_tool").unwrap().to_listing();
        assert_eq!(tool["inputSchema"]["properties"]["x"]["type"], "integer");

        let template = registry.lookup("snapshot").unwrap().to_listing();
        assert_eq!(template["uriTemplate"], "host://snapshot{?view}");
        assert_eq!(template["mimeType"], "application/json");
        assert!(template.get("uri").is_none());
    }

    #[test]
    fn handlers_default_to_host_thread() {
        let d = HandlerDescriptor::tool("t", "", ParameterSchema::new(), echo);
        assert!(d.is_host_bound());
        assert!(!d.direct().is_host_bound());
    }

    #[test]
    fn category_follows_address() {
        let registry = sample();
        let tool = registry.lookup("b_tool").unwrap();
        assert_eq!(tool.category(), Category::Tool);
        assert!(tool.address().is_none());
        assert!(tool.mime_type().is_none());

        let status = registry.lookup("status").unwrap();
        assert_eq!(status.category(), Category::Resource);
        assert_eq!(
            status.address(),
            Some(&ResourceAddress::Fixed("demo://status".into()))
        );
        assert_eq!(status.mime_type(), Some("application/json"));
        assert_eq!(status.to_listing()["uri"], "demo://status");
    }

    #[test]
    fn bad_template_is_rejected_before_registration() {
        let err = HandlerDescriptor::resource_template("t", "host://{a}{b}", "", echo).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTemplate { .. }));
    }
}
