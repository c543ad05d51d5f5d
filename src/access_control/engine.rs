//! Access control engine
//!
//! Pure decision and decoration logic. Every function here operates on
//! decoded engine objects, an index over the current resource controls and
//! the caller's identity; none of them perform I/O.

use crate::access_control::extract::{ExtractedResource, ResourceKind, Shape};
use crate::access_control::types::ResourceControl;
use crate::security::{RestrictedContext, TeamId, UserId};
use crate::store::{LabelPair, Stack};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::trace;

/// Key under which ownership metadata is attached to outgoing objects
pub const DECORATION_KEY: &str = "Portainer";

/// Lookup structure over a set of resource controls
///
/// Primary identifiers take precedence over sub-resource identifiers, so a
/// resource that owns a control and is also listed by another control resolves
/// to its own.
pub struct ResourceControlIndex<'a> {
    primary: HashMap<&'a str, &'a ResourceControl>,
    secondary: HashMap<&'a str, &'a ResourceControl>,
}

impl<'a> ResourceControlIndex<'a> {
    pub fn new(controls: &'a [ResourceControl]) -> Self {
        let mut primary = HashMap::with_capacity(controls.len());
        let mut secondary = HashMap::new();

        for control in controls {
            primary.entry(control.resource_id.as_str()).or_insert(control);
            for sub in &control.sub_resource_ids {
                secondary.entry(sub.as_str()).or_insert(control);
            }
        }

        Self { primary, secondary }
    }

    /// Resolve a control by primary identifier, then by sub-resource identifier
    pub fn lookup(&self, id: &str) -> Option<&'a ResourceControl> {
        self.primary
            .get(id)
            .or_else(|| self.secondary.get(id))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}

/// Outcome of evaluating one resource against the controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome<'a> {
    /// No control guards the resource; visible to everyone
    Uncontrolled,
    /// A control guards the resource and the caller passes it
    Granted(&'a ResourceControl),
    /// A control guards the resource and the caller fails it
    Denied,
}

impl AccessOutcome<'_> {
    pub fn is_denied(&self) -> bool {
        matches!(self, AccessOutcome::Denied)
    }
}

/// Whether a non-administrator passes a control
pub fn can_user_access(user_id: UserId, team_ids: &[TeamId], control: &ResourceControl) -> bool {
    control.grants_user(user_id) || team_ids.iter().any(|&team| control.grants_team(team))
}

/// Evaluate the first identifier that resolves to a control
///
/// The direct identifier comes first in `resource.identifiers`, so a direct
/// match always wins over a label match.
pub fn apply_access_control<'a>(
    resource: &ExtractedResource,
    index: &ResourceControlIndex<'a>,
    context: &RestrictedContext,
) -> AccessOutcome<'a> {
    let Some(control) = resource
        .identifiers
        .iter()
        .find_map(|id| index.lookup(id))
    else {
        return AccessOutcome::Uncontrolled;
    };

    if context.is_admin || can_user_access(context.user_id, &context.team_ids(), control) {
        AccessOutcome::Granted(control)
    } else {
        trace!(resource_id = %control.resource_id, "Resource hidden by resource control");
        AccessOutcome::Denied
    }
}

/// Attach `control` to `object` under [`DECORATION_KEY`]
///
/// Non-object values are left untouched.
pub fn decorate_object(object: &mut Value, control: &ResourceControl) {
    if let Value::Object(map) = object {
        map.insert(
            DECORATION_KEY.to_string(),
            json!({ "ResourceControl": control }),
        );
    }
}

/// Keep the items the caller may see, decorating the controlled ones
///
/// The result preserves the relative order of kept items.
pub fn filter_collection(
    items: Vec<Value>,
    kind: ResourceKind,
    index: &ResourceControlIndex<'_>,
    context: &RestrictedContext,
) -> Vec<Value> {
    let rule = kind.rule(Shape::Summary);

    items
        .into_iter()
        .filter_map(|mut item| {
            let resource = rule.extract(&item);
            match apply_access_control(&resource, index, context) {
                AccessOutcome::Uncontrolled => Some(item),
                AccessOutcome::Granted(control) => {
                    decorate_object(&mut item, control);
                    Some(item)
                }
                AccessOutcome::Denied => None,
            }
        })
        .collect()
}

/// Check a single inspected object, decorating it when a control grants access
///
/// Returns `None` when the caller is denied.
pub fn check_object(
    mut object: Value,
    kind: ResourceKind,
    index: &ResourceControlIndex<'_>,
    context: &RestrictedContext,
) -> Option<Value> {
    let resource = kind.rule(Shape::Inspect).extract(&object);
    match apply_access_control(&resource, index, context) {
        AccessOutcome::Uncontrolled => Some(object),
        AccessOutcome::Granted(control) => {
            decorate_object(&mut object, control);
            Some(object)
        }
        AccessOutcome::Denied => None,
    }
}

/// Drop containers carrying any of the black-listed `name=value` labels
pub fn filter_blacklisted_containers(items: Vec<Value>, blacklist: &[LabelPair]) -> Vec<Value> {
    if blacklist.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let labels = item.get("Labels").and_then(Value::as_object);
            !blacklist.iter().any(|pair| label_matches(labels, pair))
        })
        .collect()
}

fn label_matches(labels: Option<&Map<String, Value>>, pair: &LabelPair) -> bool {
    labels
        .and_then(|l| l.get(&pair.name))
        .and_then(Value::as_str)
        .is_some_and(|value| value == pair.value)
}

/// Stack combined with the control guarding it
#[derive(Debug, Clone, Serialize)]
pub struct ExtendedStack {
    #[serde(flatten)]
    pub stack: Stack,
    #[serde(rename = "ResourceControl", skip_serializing_if = "Option::is_none")]
    pub resource_control: Option<ResourceControl>,
}

/// Whether a caller may access a stack guarded by `control`
pub fn can_access_stack(control: Option<&ResourceControl>, context: &RestrictedContext) -> bool {
    match control {
        None => true,
        Some(control) => {
            context.is_admin || can_user_access(context.user_id, &context.team_ids(), control)
        }
    }
}

/// Keep the stacks the caller may see, attaching their controls
pub fn filter_stacks(
    stacks: Vec<Stack>,
    index: &ResourceControlIndex<'_>,
    context: &RestrictedContext,
) -> Vec<ExtendedStack> {
    stacks
        .into_iter()
        .filter_map(|stack| {
            let control = index.lookup(&stack.name);
            can_access_stack(control, context).then(|| ExtendedStack {
                stack,
                resource_control: control.cloned(),
            })
        })
        .collect()
}
