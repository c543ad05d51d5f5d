//! List filters
//!
//! Narrow store listings down to what a restricted caller may see.
//! Administrators always receive the unfiltered list.

use crate::security::types::{RestrictedContext, Team, TeamId, TeamMembership, User, UserId};
use crate::store::{Endpoint, Registry};

/// Non-administrators only see the teams they belong to
pub fn filter_user_teams(teams: Vec<Team>, context: &RestrictedContext) -> Vec<Team> {
    if context.is_admin {
        return teams;
    }
    teams
        .into_iter()
        .filter(|team| context.is_member_of(team.id))
        .collect()
}

/// Non-administrators only see non-administrator users
pub fn filter_users(users: Vec<User>, context: &RestrictedContext) -> Vec<User> {
    if context.is_admin {
        return users;
    }
    users
        .into_iter()
        .filter(|user| !user.role.is_admin())
        .collect()
}

/// Non-administrators only see registries they are authorized on
pub fn filter_registries(registries: Vec<Registry>, context: &RestrictedContext) -> Vec<Registry> {
    if context.is_admin {
        return registries;
    }
    registries
        .into_iter()
        .filter(|registry| {
            is_access_authorized(
                &registry.authorized_users,
                &registry.authorized_teams,
                context.user_id,
                &context.user_memberships,
            )
        })
        .collect()
}

/// Non-administrators only see endpoints they are authorized on
pub fn filter_endpoints(endpoints: Vec<Endpoint>, context: &RestrictedContext) -> Vec<Endpoint> {
    if context.is_admin {
        return endpoints;
    }
    endpoints
        .into_iter()
        .filter(|endpoint| {
            is_endpoint_access_authorized(endpoint, context.user_id, &context.user_memberships)
        })
        .collect()
}

/// Direct user grant or grant to one of the user's teams
pub fn is_endpoint_access_authorized(
    endpoint: &Endpoint,
    user_id: UserId,
    memberships: &[TeamMembership],
) -> bool {
    is_access_authorized(
        &endpoint.authorized_users,
        &endpoint.authorized_teams,
        user_id,
        memberships,
    )
}

fn is_access_authorized(
    users: &[UserId],
    teams: &[TeamId],
    user_id: UserId,
    memberships: &[TeamMembership],
) -> bool {
    users.contains(&user_id) || memberships.iter().any(|m| teams.contains(&m.team_id))
}
