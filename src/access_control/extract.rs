//! Identifier extraction rules
//!
//! Every resource kind routed through the proxy has one rule per response
//! shape describing where its ownership identifiers live. Rules are selected
//! with exhaustive matches, so adding a kind without a rule does not compile.

use serde_json::Value;
use std::fmt;

/// Label naming the swarm service that owns a container
pub const SERVICE_ID_LABEL: &str = "com.docker.swarm.service.id";

/// Label naming the stack that owns a resource
pub const STACK_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";

/// Engine resource kinds subject to resource controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Container,
    Service,
    Volume,
    Network,
    Secret,
    Config,
    Task,
}

impl ResourceKind {
    /// Path segment used by the engine API
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Container => "containers",
            ResourceKind::Service => "services",
            ResourceKind::Volume => "volumes",
            ResourceKind::Network => "networks",
            ResourceKind::Secret => "secrets",
            ResourceKind::Config => "configs",
            ResourceKind::Task => "tasks",
        }
    }

    pub fn try_parse(segment: &str) -> Option<Self> {
        match segment {
            "containers" => Some(ResourceKind::Container),
            "services" => Some(ResourceKind::Service),
            "volumes" => Some(ResourceKind::Volume),
            "networks" => Some(ResourceKind::Network),
            "secrets" => Some(ResourceKind::Secret),
            "configs" => Some(ResourceKind::Config),
            "tasks" => Some(ResourceKind::Task),
            _ => None,
        }
    }

    /// Field wrapping the array in list responses, if the list is not a bare array
    pub const fn collection_field(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Volume => Some("Volumes"),
            ResourceKind::Container
            | ResourceKind::Service
            | ResourceKind::Network
            | ResourceKind::Secret
            | ResourceKind::Config
            | ResourceKind::Task => None,
        }
    }

    /// JSON pointer to the identifier the engine assigns to objects of this kind
    pub const fn identifier_field(&self) -> &'static str {
        match self {
            ResourceKind::Container | ResourceKind::Network => "/Id",
            ResourceKind::Volume => "/Name",
            ResourceKind::Service
            | ResourceKind::Secret
            | ResourceKind::Config
            | ResourceKind::Task => "/ID",
        }
    }

    /// Ordered identifier sources for objects of this kind
    pub fn rule(&self, shape: Shape) -> ExtractionRule {
        let sources = match (self, shape) {
            (ResourceKind::Container, Shape::Summary) => CONTAINER_SUMMARY,
            (ResourceKind::Container, Shape::Inspect) => CONTAINER_INSPECT,
            (ResourceKind::Service | ResourceKind::Secret | ResourceKind::Config, _) => SWARM_OBJECT,
            (ResourceKind::Volume, _) => VOLUME,
            (ResourceKind::Network, _) => NETWORK,
            (ResourceKind::Task, _) => TASK,
        };

        ExtractionRule { sources }
    }
}

const CONTAINER_SUMMARY: &[IdentifierSource] = &[
    IdentifierSource::Field("/Id"),
    IdentifierSource::Label {
        map: "/Labels",
        key: SERVICE_ID_LABEL,
    },
    IdentifierSource::Label {
        map: "/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

const CONTAINER_INSPECT: &[IdentifierSource] = &[
    IdentifierSource::Field("/Id"),
    IdentifierSource::Label {
        map: "/Config/Labels",
        key: SERVICE_ID_LABEL,
    },
    IdentifierSource::Label {
        map: "/Config/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

// Services, secrets and configs share the swarm object layout
const SWARM_OBJECT: &[IdentifierSource] = &[
    IdentifierSource::Field("/ID"),
    IdentifierSource::Label {
        map: "/Spec/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

const VOLUME: &[IdentifierSource] = &[
    IdentifierSource::Field("/Name"),
    IdentifierSource::Label {
        map: "/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

const NETWORK: &[IdentifierSource] = &[
    IdentifierSource::Field("/Id"),
    IdentifierSource::Label {
        map: "/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

const TASK: &[IdentifierSource] = &[
    IdentifierSource::Field("/ServiceID"),
    IdentifierSource::Label {
        map: "/Spec/ContainerSpec/Labels",
        key: STACK_NAMESPACE_LABEL,
    },
];

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response shape an object was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Element of a list response
    Summary,
    /// Single-object inspect response
    Inspect,
}

/// Where one ownership identifier lives inside an engine object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    /// JSON pointer to a string field
    Field(&'static str),
    /// Label `key` inside the label map at JSON pointer `map`
    Label {
        map: &'static str,
        key: &'static str,
    },
}

/// Ordered identifier sources; earlier sources take precedence
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    pub sources: &'static [IdentifierSource],
}

impl ExtractionRule {
    /// Extract every identifier present on `object`, in precedence order
    pub fn extract(&self, object: &Value) -> ExtractedResource {
        let identifiers = self
            .sources
            .iter()
            .filter_map(|source| match source {
                IdentifierSource::Field(pointer) => object.pointer(pointer).and_then(Value::as_str),
                IdentifierSource::Label { map, key } => {
                    resolve_identifier_from_label(object.pointer(map), key)
                }
            })
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect();

        ExtractedResource { identifiers }
    }
}

/// Typed result of applying an extraction rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedResource {
    /// Candidate lookup keys, direct identifier first
    pub identifiers: Vec<String>,
}

/// Read a label value to use as a resource control lookup key
///
/// Returns `None` when the label map or the label is absent, in which case
/// the label does not take part in the access decision.
pub fn resolve_identifier_from_label<'a>(labels: Option<&'a Value>, key: &str) -> Option<&'a str> {
    labels?.as_object()?.get(key)?.as_str()
}
