//! In-memory test doubles.

use std::sync::{Arc, Mutex, MutexGuard};

use common::{
    operations::{By, Commit, Delete, Insert, Select, Transact, Update},
    DateTime,
};
use tracerr::Traced;

use crate::{
    domain::{identity, membership, tenant, token},
    domain::{Identity, Membership, Tenant, Token},
    infra::database,
    Config, Service,
};

/// [`Service`] backed by a [`Mem`] database.
pub(crate) type MemService = Service<Mem>;

/// Creates a [`MemService`] and a handle to its backing [`Mem`].
pub(crate) fn service() -> (MemService, Mem) {
    let mem = Mem::default();
    let service = Service {
        config: Config {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                b"test-secret",
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"test-secret",
            ),
            clean_expired_tokens: crate::task::clean_expired_tokens::Config {
                interval: std::time::Duration::from_secs(60 * 60),
            },
        },
        database: mem.clone(),
    };
    (service, mem)
}

/// In-memory [`Database`] double.
///
/// Every mutation runs under one [`Mutex`], which models the atomicity the
/// production schema gets from single-statement SQL.
///
/// [`Database`]: crate::infra::Database
#[derive(Clone, Debug, Default)]
pub(crate) struct Mem(Arc<State>);

/// Records held by a [`Mem`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Identity`]s.
    identities: Mutex<Vec<Identity>>,

    /// Stored [`Membership`]s.
    memberships: Mutex<Vec<Membership>>,

    /// Stored [`Tenant`]s.
    tenants: Mutex<Vec<Tenant>>,

    /// Stored [`Token`]s.
    tokens: Mutex<Vec<Token>>,
}

impl Mem {
    fn identities(&self) -> MutexGuard<'_, Vec<Identity>> {
        self.0.identities.lock().unwrap()
    }

    fn memberships(&self) -> MutexGuard<'_, Vec<Membership>> {
        self.0.memberships.lock().unwrap()
    }

    fn tenants(&self) -> MutexGuard<'_, Vec<Tenant>> {
        self.0.tenants.lock().unwrap()
    }

    fn tokens(&self) -> MutexGuard<'_, Vec<Token>> {
        self.0.tokens.lock().unwrap()
    }

    /// Stores a live [`Identity`] with the provided credentials.
    pub(crate) fn given_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Identity {
        let identity = Identity {
            id: identity::Id::new(),
            name: identity::Name::new("Staff Member").unwrap(),
            email: identity::Email::new(email).unwrap(),
            password_hash: identity::PasswordHash::new(
                &identity::Password::new(password).unwrap(),
            ),
            avatar_url: None,
            preferred_tenant: None,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        };
        self.identities().push(identity.clone());
        identity
    }

    /// Stores an operable [`Tenant`].
    pub(crate) fn given_tenant(
        &self,
        name: &str,
        active_subscription: bool,
    ) -> Tenant {
        let tenant = Tenant {
            id: tenant::Id::new(),
            name: tenant::Name::new(name).unwrap(),
            plan: None,
            seat_limit: tenant::SeatLimit::default(),
            active_subscription,
            created_at: DateTime::now().coerce(),
            disabled_at: None,
            deleted_at: None,
        };
        self.tenants().push(tenant.clone());
        tenant
    }

    /// Stores an operable [`Tenant`] with the provided seat limit.
    pub(crate) fn given_tenant_with_seats(
        &self,
        name: &str,
        seats: i32,
    ) -> Tenant {
        let tenant = Tenant {
            seat_limit: tenant::SeatLimit::new(seats).unwrap(),
            ..self.given_tenant(name, true)
        };
        for t in self.tenants().iter_mut() {
            if t.id == tenant.id {
                *t = tenant.clone();
            }
        }
        tenant
    }

    /// Stores an activated [`Membership`].
    pub(crate) fn given_membership(
        &self,
        identity: &Identity,
        tenant: &Tenant,
        role: membership::Role,
    ) -> Membership {
        let membership = Membership {
            identity_id: identity.id,
            tenant_id: tenant.id,
            role,
            created_at: DateTime::now().coerce(),
            activated_at: Some(DateTime::now().coerce()),
            banned_at: None,
            deleted_at: None,
        };
        self.memberships().push(membership);
        membership
    }

    /// Stores a not-yet-activated [`Membership`].
    pub(crate) fn given_pending_membership(
        &self,
        identity: &Identity,
        tenant: &Tenant,
        role: membership::Role,
    ) -> Membership {
        let membership = Membership {
            identity_id: identity.id,
            tenant_id: tenant.id,
            role,
            created_at: DateTime::now().coerce(),
            activated_at: None,
            banned_at: None,
            deleted_at: None,
        };
        self.memberships().push(membership);
        membership
    }

    /// Bans the stored counterpart of the provided [`Membership`].
    pub(crate) fn ban_membership(&self, membership: &Membership) {
        for m in self.memberships().iter_mut() {
            if m.identity_id == membership.identity_id
                && m.tenant_id == membership.tenant_id
            {
                m.banned_at = Some(DateTime::now().coerce());
            }
        }
    }

    /// Sets the preferred [`Tenant`] of the stored [`Identity`].
    pub(crate) fn prefer_tenant(&self, identity: &Identity, tenant: &Tenant) {
        for i in self.identities().iter_mut() {
            if i.id == identity.id {
                i.preferred_tenant = Some(tenant.id);
            }
        }
    }

    /// Returns the preferred [`tenant::Id`] of the stored [`Identity`].
    pub(crate) fn preferred_tenant(
        &self,
        identity: &Identity,
    ) -> Option<tenant::Id> {
        self.identities()
            .iter()
            .find(|i| i.id == identity.id)
            .and_then(|i| i.preferred_tenant)
    }

    /// Flips the subscription state of the stored [`Tenant`].
    pub(crate) fn set_subscription(&self, id: tenant::Id, active: bool) {
        for t in self.tenants().iter_mut() {
            if t.id == id {
                t.active_subscription = active;
            }
        }
    }

    /// Indicates whether a [`Token`] with the provided [`token::Value`] is
    /// stored.
    pub(crate) fn token_exists(&self, value: &token::Value) -> bool {
        self.tokens().iter().any(|t| t.value == *value)
    }

    /// Indicates whether an [`Identity`] with the provided [`identity::Id`]
    /// is stored.
    pub(crate) fn identity_exists(&self, id: identity::Id) -> bool {
        self.identities().iter().any(|i| i.id == id)
    }
}

impl database::Database<Select<By<Option<Identity>, identity::Id>>> for Mem {
    type Ok = Option<Identity>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Identity>, identity::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .identities()
            .iter()
            .find(|i| i.id == id && i.deleted_at.is_none())
            .cloned())
    }
}

impl<'e> database::Database<Select<By<Option<Identity>, &'e identity::Email>>>
    for Mem
{
    type Ok = Option<Identity>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Identity>, &'e identity::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .identities()
            .iter()
            .find(|i| i.email == *email && i.deleted_at.is_none())
            .cloned())
    }
}

impl database::Database<Insert<Identity>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(identity): Insert<Identity>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(identity)).await
    }
}

impl database::Database<Update<Identity>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(identity): Update<Identity>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut identities = self.identities();
        if let Some(i) = identities.iter_mut().find(|i| i.id == identity.id) {
            *i = identity;
        } else {
            identities.push(identity);
        }
        Ok(())
    }
}

impl
    database::Database<
        Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
    > for Mem
{
    type Ok = Option<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (identity_id, tenant_id) = by.into_inner();
        Ok(self
            .memberships()
            .iter()
            .find(|m| {
                m.identity_id == identity_id && m.tenant_id == tenant_id
            })
            .copied())
    }
}

impl database::Database<Select<By<Vec<Membership>, identity::Id>>> for Mem {
    type Ok = Vec<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Membership>, identity::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let identity_id = by.into_inner();
        Ok(self
            .memberships()
            .iter()
            .filter(|m| m.identity_id == identity_id)
            .copied()
            .collect())
    }
}

impl database::Database<Select<By<Vec<Membership>, tenant::Id>>> for Mem {
    type Ok = Vec<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Membership>, tenant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let tenant_id = by.into_inner();
        Ok(self
            .memberships()
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .copied()
            .collect())
    }
}

impl database::Database<Insert<Membership>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(membership): Insert<Membership>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(membership)).await
    }
}

impl database::Database<Update<Membership>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(membership): Update<Membership>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut memberships = self.memberships();
        if let Some(m) = memberships.iter_mut().find(|m| {
            m.identity_id == membership.identity_id
                && m.tenant_id == membership.tenant_id
        }) {
            *m = membership;
        } else {
            memberships.push(membership);
        }
        Ok(())
    }
}

impl database::Database<Select<By<Option<Tenant>, tenant::Id>>> for Mem {
    type Ok = Option<Tenant>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Tenant>, tenant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .tenants()
            .iter()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .cloned())
    }
}

impl database::Database<Insert<Tenant>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(tenant): Insert<Tenant>,
    ) -> Result<Self::Ok, Self::Err> {
        self.tenants().push(tenant);
        Ok(())
    }
}

impl database::Database<Update<Tenant>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(tenant): Update<Tenant>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut tenants = self.tenants();
        if let Some(t) = tenants.iter_mut().find(|t| t.id == tenant.id) {
            *t = tenant;
        } else {
            tenants.push(tenant);
        }
        Ok(())
    }
}

impl database::Database<Insert<Token>> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(token): Insert<Token>,
    ) -> Result<Self::Ok, Self::Err> {
        self.tokens().push(token);
        Ok(())
    }
}

impl<'v> database::Database<Select<By<Option<Token>, &'v token::Value>>>
    for Mem
{
    type Ok = Option<Token>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Token>, &'v token::Value>>,
    ) -> Result<Self::Ok, Self::Err> {
        let value = by.into_inner();
        Ok(self.tokens().iter().find(|t| t.value == *value).cloned())
    }
}

impl<'v>
    database::Database<
        Delete<By<Option<Token>, (&'v token::Value, token::Purpose)>>,
    > for Mem
{
    type Ok = Option<Token>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<
            By<Option<Token>, (&'v token::Value, token::Purpose)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (value, purpose) = by.into_inner();
        // One guard held across find-and-remove: models the atomicity of the
        // production conditional `DELETE`.
        let mut tokens = self.tokens();
        let now = DateTime::now().coerce();
        let position = tokens.iter().position(|t| {
            t.value == *value && t.purpose == purpose && t.expires_at > now
        });
        Ok(position.map(|i| tokens.remove(i)))
    }
}

impl database::Database<Delete<By<Token, token::ExpirationDateTime>>>
    for Mem
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Token, token::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        self.tokens().retain(|t| t.expires_at > deadline);
        Ok(())
    }
}

impl database::Database<Transact> for Mem {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl database::Database<Commit> for Mem {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}
