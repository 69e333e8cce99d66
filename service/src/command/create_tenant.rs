//! [`Command`] for onboarding a new [`Tenant`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{identity, membership, tenant, Identity, Membership, Tenant},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for onboarding a new [`Tenant`].
///
/// The creator receives an activated [`membership::Role::Admin`]
/// [`Membership`] and the new [`Tenant`] becomes their preferred one. The
/// subscription starts inactive until the billing collaborator confirms it:
/// the admin bypass of the subscription gate lets the creator in meanwhile.
#[derive(Clone, Debug)]
pub struct CreateTenant {
    /// ID of the [`Identity`] onboarding the [`Tenant`].
    pub identity_id: identity::Id,

    /// [`tenant::Name`] of the new [`Tenant`].
    pub name: tenant::Name,

    /// Billing [`tenant::Plan`] chosen on onboarding, if any.
    pub plan: Option<tenant::Plan>,

    /// [`tenant::SeatLimit`] of the new [`Tenant`].
    pub seat_limit: Option<tenant::SeatLimit>,
}

/// Output of [`CreateTenant`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Created [`Tenant`].
    pub tenant: Tenant,

    /// [`Membership`] of the creator in the created [`Tenant`].
    pub membership: Membership,
}

impl<Db> Command<CreateTenant> for Service<Db>
where
    Db: Database<
            Select<By<Option<Identity>, identity::Id>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Tenant>, Err = Traced<database::Error>>
        + Database<Insert<Membership>, Err = Traced<database::Error>>
        + Database<Update<Identity>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateTenant) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateTenant {
            identity_id,
            name,
            plan,
            seat_limit,
        } = cmd;

        let mut identity = self
            .database()
            .execute(Select(By::new(identity_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::IdentityNotExists(identity_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let tenant = Tenant {
            id: tenant::Id::new(),
            name,
            plan,
            seat_limit: seat_limit.unwrap_or_default(),
            active_subscription: false,
            created_at: now.coerce(),
            disabled_at: None,
            deleted_at: None,
        };
        let membership = Membership {
            identity_id,
            tenant_id: tenant.id,
            role: membership::Role::Admin,
            created_at: now.coerce(),
            activated_at: Some(now.coerce()),
            banned_at: None,
            deleted_at: None,
        };
        identity.preferred_tenant = Some(tenant.id);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(tenant.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(membership))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(identity))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(Output { tenant, membership })
    }
}

/// Error of [`CreateTenant`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Identity`] with the provided ID does not exist.
    #[display("`Identity(id: {_0})` does not exist")]
    #[from(ignore)]
    IdentityNotExists(#[error(not(source))] identity::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::Command as _,
        domain::{membership::Role, tenant},
        testing,
    };

    use super::CreateTenant;

    #[tokio::test]
    async fn creator_becomes_admin_of_preferred_tenant() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let output = service
            .execute(CreateTenant {
                identity_id: identity.id,
                name: tenant::Name::new("Bright Smiles").unwrap(),
                plan: None,
                seat_limit: None,
            })
            .await
            .unwrap();

        assert_eq!(output.membership.role, Role::Admin);
        assert!(output.membership.is_operable());
        assert!(!output.tenant.active_subscription);
        assert_eq!(
            mem.preferred_tenant(&identity),
            Some(output.tenant.id),
        );
    }
}
