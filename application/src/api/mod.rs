//! GraphQL API definitions.

pub mod access;
pub mod identity;
mod mutation;
mod query;
pub mod scalar;
pub mod tenant;
pub mod token;

use crate::Context;

pub use self::{
    access::Redirect, identity::Identity, mutation::Mutation, query::Query,
    tenant::Tenant,
};

/// GraphQL schema.
pub type Schema = juniper::RootNode<
    'static,
    Query,
    Mutation,
    juniper::EmptySubscription<Context>,
>;
