//! [`Query`] collection related to [`Membership`]s.

use common::operations::By;

use crate::domain::{identity, tenant, Membership};
#[cfg(doc)]
use crate::{domain::Identity, Query};

use super::DatabaseQuery;

/// Queries all [`Membership`]s of an [`Identity`].
pub type OfIdentity = DatabaseQuery<By<Vec<Membership>, identity::Id>>;

/// Queries the [`Membership`] of an [`Identity`] in a particular `Tenant`.
pub type ByIdentityAndTenant =
    DatabaseQuery<By<Option<Membership>, (identity::Id, tenant::Id)>>;

/// Queries all [`Membership`]s of a `Tenant`.
pub type OfTenant = DatabaseQuery<By<Vec<Membership>, tenant::Id>>;
