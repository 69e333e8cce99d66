//! [`Query`] collection related to a single [`Identity`].

use common::operations::By;

use crate::domain::{identity, Identity};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries an [`Identity`] by its [`identity::Id`].
pub type ById = DatabaseQuery<By<Option<Identity>, identity::Id>>;

/// Queries an [`Identity`] by its [`identity::Email`].
pub type ByEmail<'e> =
    DatabaseQuery<By<Option<Identity>, &'e identity::Email>>;
