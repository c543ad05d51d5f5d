//! Security context resolution
//!
//! Tokens, identities and the request bouncer that turns a bearer token into
//! a typed identity for each request.

mod authorization;
mod bouncer;
mod filter;
mod jwt;
mod types;

pub use authorization::{
    authorized_resource_control_access, authorized_resource_control_creation,
    authorized_resource_control_deletion, authorized_resource_control_update,
};
pub use bouncer::{
    RequestBouncer, administrator_access, authenticated_access, public_access, restricted_access,
};
pub use filter::{
    filter_endpoints, filter_registries, filter_user_teams, filter_users,
    is_endpoint_access_authorized,
};
pub use jwt::{JwtService, hash_password, verify_password};
pub use types::{
    MembershipId, MembershipRole, RestrictedContext, Team, TeamId, TeamMembership, TokenData, User,
    UserId, UserRole,
};
