//! [`Command`] definition.

pub mod activate_membership;
pub mod authorize_access;
pub mod authorize_identity_session;
pub mod consume_token;
pub mod create_identity;
pub mod create_identity_session;
pub mod create_tenant;
pub mod invite_member;
pub mod issue_token;
pub mod reset_identity_password;
pub mod switch_tenant;
pub mod update_tenant_name;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    activate_membership::ActivateMembership,
    authorize_access::{Access, AuthorizeAccess, Redirect, Requirement},
    authorize_identity_session::AuthorizeIdentitySession,
    consume_token::ConsumeToken, create_identity::CreateIdentity,
    create_identity_session::CreateIdentitySession,
    create_tenant::CreateTenant, invite_member::InviteMember,
    issue_token::IssueToken,
    reset_identity_password::ResetIdentityPassword,
    switch_tenant::SwitchTenant, update_tenant_name::UpdateTenantName,
};
