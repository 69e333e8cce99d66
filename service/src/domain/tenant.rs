//! [`Tenant`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Membership;

/// Clinic organization owning its own staff, patients and subscription.
#[derive(Clone, Debug, From)]
pub struct Tenant {
    /// ID of this [`Tenant`].
    pub id: Id,

    /// [`Name`] of this [`Tenant`].
    pub name: Name,

    /// Billing [`Plan`] this [`Tenant`] is subscribed to.
    pub plan: Option<Plan>,

    /// [`SeatLimit`] of this [`Tenant`].
    pub seat_limit: SeatLimit,

    /// Indicator whether this [`Tenant`]'s subscription is currently active.
    ///
    /// Always read fresh from persistence before a security-relevant
    /// decision.
    pub active_subscription: bool,

    /// [`DateTime`] when this [`Tenant`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Tenant`] was disabled.
    pub disabled_at: Option<DisablingDateTime>,

    /// [`DateTime`] when this [`Tenant`] was deleted.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Tenant {
    /// Indicates whether this [`Tenant`] may be acted in at all.
    ///
    /// A disabled or deleted [`Tenant`] rejects every [`Membership`].
    #[must_use]
    pub fn is_operable(&self) -> bool {
        self.disabled_at.is_none() && self.deleted_at.is_none()
    }
}

/// ID of a [`Tenant`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Name of a [`Tenant`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 256
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Reference to a billing plan of a [`Tenant`].
///
/// Opaque to this service: assigned and interpreted by the billing
/// collaborator.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Plan(String);

impl Plan {
    /// Creates a new [`Plan`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        Self::check(&reference).then_some(Self(reference))
    }

    /// Checks whether the given `reference` is a valid [`Plan`].
    fn check(reference: impl AsRef<str>) -> bool {
        let reference = reference.as_ref();
        !reference.is_empty() && reference.len() <= 64
    }
}

impl FromStr for Plan {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Plan`")
    }
}

/// Maximum number of staff seats a [`Tenant`] may occupy.
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct SeatLimit(i32);

impl SeatLimit {
    /// Creates a new [`SeatLimit`] if the given `limit` is valid.
    #[must_use]
    pub fn new(limit: i32) -> Option<Self> {
        (limit > 0).then_some(Self(limit))
    }
}

impl Default for SeatLimit {
    fn default() -> Self {
        Self(5)
    }
}

/// [`DateTime`] when a [`Tenant`] was created.
pub type CreationDateTime = DateTimeOf<(Tenant, unit::Creation)>;

/// [`DateTime`] when a [`Tenant`] was disabled.
pub type DisablingDateTime = DateTimeOf<(Tenant, unit::Disabling)>;

/// [`DateTime`] when a [`Tenant`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Tenant, unit::Deletion)>;
