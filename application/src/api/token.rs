//! Single-use token definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use juniper::{GraphQLObject, GraphQLScalar};
use service::domain;

use crate::{api::scalar, Context};

/// Opaque value of a single-use token.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "TokenValue",
    with = scalar::Via::<domain::token::Value>,
)]
pub struct Value(domain::token::Value);

/// Result of issuing a single-use token.
///
/// Delivering the value to its email is the caller's job: this API never
/// sends mail itself.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context, name = "IssueTokenResult")]
pub struct IssueResult {
    /// Opaque value of the issued token.
    pub value: Value,

    /// `DateTime` when the issued token expires.
    pub expires_at: DateTime,
}

impl From<domain::Token> for IssueResult {
    fn from(token: domain::Token) -> Self {
        Self {
            value: token.value.into(),
            expires_at: token.expires_at.coerce(),
        }
    }
}
