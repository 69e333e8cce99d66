//! Domain definitions.

pub mod identity;
pub mod membership;
pub mod tenant;
pub mod token;

pub use self::{
    identity::Identity, membership::Membership, tenant::Tenant, token::Token,
};
