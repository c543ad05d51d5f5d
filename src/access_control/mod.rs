//! Access control engine
//!
//! Decides which proxied engine resources a caller may see or act upon, based
//! on persisted resource controls.
//!
//! ## Decision model
//!
//! ```text
//! object → extraction rule → ordered identifiers → first control found → grant check
//! ```
//!
//! - Objects without a control are visible to everyone.
//! - Administrators pass every control.
//! - Other callers pass a control when it grants their user id or one of their teams.

mod engine;
mod extract;
mod types;

pub use engine::{
    AccessOutcome, DECORATION_KEY, ExtendedStack, ResourceControlIndex, apply_access_control,
    can_access_stack, can_user_access, check_object, decorate_object,
    filter_blacklisted_containers, filter_collection, filter_stacks,
};
pub use extract::{
    ExtractedResource, ExtractionRule, IdentifierSource, ResourceKind, SERVICE_ID_LABEL,
    STACK_NAMESPACE_LABEL, Shape, resolve_identifier_from_label,
};
pub use types::{
    AccessLevel, ResourceControl, ResourceControlId, ResourceControlType, TeamResourceAccess,
    UserResourceAccess,
};
