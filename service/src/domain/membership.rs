//! [`Membership`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::From;

use crate::domain::{identity, tenant};
#[cfg(doc)]
use crate::domain::{Identity, Tenant};

/// Association of an [`Identity`] to a [`Tenant`].
///
/// At most one [`Membership`] exists per ([`Identity`], [`Tenant`]) pair.
#[derive(Clone, Copy, Debug, From)]
pub struct Membership {
    /// ID of the [`Identity`] this [`Membership`] belongs to.
    pub identity_id: identity::Id,

    /// ID of the [`Tenant`] this [`Membership`] belongs to.
    pub tenant_id: tenant::Id,

    /// [`Role`] of this [`Membership`].
    pub role: Role,

    /// [`DateTime`] when this [`Membership`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Membership`] was activated.
    pub activated_at: Option<ActivationDateTime>,

    /// [`DateTime`] when this [`Membership`] was banned.
    pub banned_at: Option<BanDateTime>,

    /// [`DateTime`] when this [`Membership`] was deleted.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Membership {
    /// Indicates whether this [`Membership`] may act in its [`Tenant`].
    ///
    /// A [`Membership`] is operable once activated, and only until banned or
    /// deleted.
    #[must_use]
    pub fn is_operable(&self) -> bool {
        self.activated_at.is_some()
            && self.banned_at.is_none()
            && self.deleted_at.is_none()
    }
}

define_kind! {
    #[doc = "Role of a `Membership` in its `Tenant`."]
    enum Role {
        #[doc = "Administers the `Tenant`: staff, settings and billing."]
        Admin = 1,

        #[doc = "Regular staff member of the `Tenant`."]
        User = 2,
    }
}

impl Role {
    /// Indicates whether this [`Role`] satisfies the `required` one.
    ///
    /// [`Role`]s form a strict ladder: [`Role::Admin`] satisfies everything,
    /// [`Role::User`] satisfies [`Role::User`] only.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.u8() <= required.u8()
    }
}

/// [`DateTime`] when a [`Membership`] was created.
pub type CreationDateTime = DateTimeOf<(Membership, unit::Creation)>;

/// [`DateTime`] when a [`Membership`] was activated.
pub type ActivationDateTime = DateTimeOf<(Membership, unit::Activation)>;

/// [`DateTime`] when a [`Membership`] was banned.
pub type BanDateTime = DateTimeOf<(Membership, unit::Ban)>;

/// [`DateTime`] when a [`Membership`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Membership, unit::Deletion)>;

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::domain::{identity, tenant};

    use super::{Membership, Role};

    fn membership() -> Membership {
        Membership {
            identity_id: identity::Id::new(),
            tenant_id: tenant::Id::new(),
            role: Role::User,
            created_at: DateTime::now().coerce(),
            activated_at: Some(DateTime::now().coerce()),
            banned_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn role_ladder() {
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::User));
        assert!(Role::User.satisfies(Role::User));
        assert!(!Role::User.satisfies(Role::Admin));
    }

    #[test]
    fn operable_requires_activation() {
        let mut m = membership();
        assert!(m.is_operable());

        m.activated_at = None;
        assert!(!m.is_operable());
    }

    #[test]
    fn banned_is_not_operable() {
        let mut m = membership();
        m.banned_at = Some(DateTime::now().coerce());

        assert!(!m.is_operable());
    }

    #[test]
    fn deleted_is_not_operable() {
        let mut m = membership();
        m.deleted_at = Some(DateTime::now().coerce());

        assert!(!m.is_operable());
    }
}
