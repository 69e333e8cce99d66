//! [`Session`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, FromStr};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::Identity;
use crate::domain::{identity, membership, tenant};

/// Client-held proof of an authenticated [`Identity`].
///
/// Carried as signed claims inside an opaque [`Token`]. Proves identity only:
/// the embedded [`Membership`] is re-validated against live records before
/// any authorization decision.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Session {
    /// ID of the [`Identity`] this [`Session`] belongs to.
    pub identity_id: identity::Id,

    /// Active [`Membership`] selected for this [`Session`], if any.
    pub membership: Option<Membership>,

    /// [`DateTime`] when this [`Session`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

/// Active [`domain::Membership`] embedded into a [`Session`].
///
/// [`domain::Membership`]: crate::domain::Membership
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Membership {
    /// ID of the [`Tenant`] the [`Session`] acts in.
    ///
    /// [`Tenant`]: crate::domain::Tenant
    pub tenant_id: tenant::Id,

    /// [`Role`] the [`Session`] holds in the [`Tenant`].
    ///
    /// [`Role`]: membership::Role
    /// [`Tenant`]: crate::domain::Tenant
    pub role: membership::Role,
}

/// Access token of a [`Session`].
#[derive(AsRef, Clone, Debug, Display, FromStr)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;
