//! Access-gate outcome definitions.

use juniper::GraphQLObject;
use service::command;

use crate::Context;

/// Routing target returned instead of the requested data when the access
/// gate finds the caller insufficient.
///
/// Never an error: the client follows `to` to the remediation page.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context)]
pub struct Redirect {
    /// Path of the page the client must route to.
    pub to: String,
}

impl From<command::Redirect> for Redirect {
    fn from(redirect: command::Redirect) -> Self {
        Self {
            to: redirect.path().to_owned(),
        }
    }
}
