//! Resource control authorization rules
//!
//! Decide whether a non-administrator may create, alter or delete a
//! resource control. Administrators pass every rule.

use crate::access_control::ResourceControl;
use crate::security::types::RestrictedContext;

/// Whether the caller may create `control`
///
/// A standard user may create a private control owned by themselves, or
/// share a resource with teams they all belong to. Controls reserved to
/// administrators, or naming other users, are rejected.
pub fn authorized_resource_control_creation(
    control: &ResourceControl,
    context: &RestrictedContext,
) -> bool {
    if context.is_admin {
        return true;
    }
    is_self_owned_or_team_shared(control, context)
}

/// Whether the caller currently has access to `control`
pub fn authorized_resource_control_access(
    control: &ResourceControl,
    context: &RestrictedContext,
) -> bool {
    if context.is_admin {
        return true;
    }
    control.grants_user(context.user_id)
        || context
            .user_memberships
            .iter()
            .any(|m| control.grants_team(m.team_id))
}

/// Whether the caller may replace `current` with `updated`
///
/// The caller must have access to the current control, and the updated
/// control must satisfy the same shape rule as a creation.
pub fn authorized_resource_control_update(
    current: &ResourceControl,
    updated: &ResourceControl,
    context: &RestrictedContext,
) -> bool {
    if context.is_admin {
        return true;
    }
    authorized_resource_control_access(current, context)
        && is_self_owned_or_team_shared(updated, context)
}

/// Whether the caller may delete `control`
///
/// Allowed for a user named in the control, or for a leader of a granted team.
pub fn authorized_resource_control_deletion(
    control: &ResourceControl,
    context: &RestrictedContext,
) -> bool {
    if context.is_admin {
        return true;
    }
    control.grants_user(context.user_id)
        || control
            .team_accesses
            .iter()
            .any(|access| context.is_leader_of(access.team_id))
}

fn is_self_owned_or_team_shared(control: &ResourceControl, context: &RestrictedContext) -> bool {
    if control.administrators_only {
        return false;
    }

    match (control.user_accesses.as_slice(), control.team_accesses.as_slice()) {
        ([], []) => false,
        ([owner], []) => owner.user_id == context.user_id,
        ([], teams) => teams.iter().all(|t| context.is_member_of(t.team_id)),
        _ => false,
    }
}
