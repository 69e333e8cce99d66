//! [`Command`] for inviting a staff member into a [`Tenant`].

use std::time::Duration;

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        identity, membership, tenant, token, Identity, Membership, Tenant,
        Token,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] inviting an existing [`Identity`] into a [`Tenant`].
///
/// Creates a pending [`Membership`] and issues the
/// [`token::Purpose::Activation`] [`Token`] redeemed by
/// [`ActivateMembership`]. Delivering the [`Token`] is the caller's job.
///
/// [`ActivateMembership`]: super::ActivateMembership
/// [`token::Purpose::Activation`]: crate::domain::token::Purpose::Activation
#[derive(Clone, Debug)]
pub struct InviteMember {
    /// ID of the [`Tenant`] to invite into.
    pub tenant_id: tenant::Id,

    /// [`Email`] of the invited [`Identity`].
    ///
    /// [`Email`]: identity::Email
    pub email: identity::Email,

    /// [`membership::Role`] the invitee receives.
    pub role: membership::Role,

    /// Time the activation [`Token`] stays redeemable for.
    pub ttl: Duration,
}

/// Output of [`InviteMember`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Created pending [`Membership`].
    pub membership: Membership,

    /// Issued activation [`Token`].
    pub token: Token,
}

impl<Db> Command<InviteMember> for Service<Db>
where
    Db: for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
            Ok = Option<Membership>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Membership>, tenant::Id>>,
            Ok = Vec<Membership>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Tenant>, tenant::Id>>,
            Ok = Option<Tenant>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Membership>, Err = Traced<database::Error>>
        + Database<Insert<Token>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: InviteMember) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InviteMember {
            tenant_id,
            email,
            role,
            ttl,
        } = cmd;

        let identity = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UnknownEmail(email.clone()))
            .map_err(tracerr::wrap!())?;

        let existing = self
            .database()
            .execute(Select(By::new((identity.id, tenant_id))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some_and(|m| m.deleted_at.is_none()) {
            return Err(tracerr::new!(E::AlreadyMember));
        }

        let tenant = self
            .database()
            .execute(Select(By::<Option<Tenant>, _>::new(tenant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TenantNotExists(tenant_id))
            .map_err(tracerr::wrap!())?;
        let occupied = self
            .database()
            .execute(Select(By::<Vec<Membership>, _>::new(tenant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .iter()
            .filter(|m| m.deleted_at.is_none())
            .count();
        let seats = usize::try_from(i32::from(tenant.seat_limit))
            .unwrap_or_default();
        if occupied >= seats {
            return Err(tracerr::new!(E::SeatLimitExceeded(tenant.seat_limit)));
        }

        let now = DateTime::now();
        let membership = Membership {
            identity_id: identity.id,
            tenant_id,
            role,
            created_at: now.coerce(),
            activated_at: None,
            banned_at: None,
            deleted_at: None,
        };
        let token = Token {
            value: token::Value::generate(),
            email,
            purpose: token::Purpose::Activation,
            created_at: now.coerce(),
            expires_at: (now + ttl).coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(membership))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(token.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(Output { membership, token })
    }
}

/// Error of [`InviteMember`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Invitee already holds a [`Membership`] in the [`Tenant`].
    ///
    /// [`Tenant`]: crate::domain::Tenant
    #[display("`Identity` is already a member of the `Tenant`")]
    AlreadyMember,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Tenant`] has no free seats left.
    ///
    /// [`Tenant`]: crate::domain::Tenant
    #[display("`Tenant` seat limit of {_0} is exceeded")]
    #[from(ignore)]
    SeatLimitExceeded(#[error(not(source))] tenant::SeatLimit),

    /// [`Tenant`] with the provided ID does not exist.
    ///
    /// [`Tenant`]: crate::domain::Tenant
    #[display("`Tenant(id: {_0})` does not exist")]
    #[from(ignore)]
    TenantNotExists(#[error(not(source))] tenant::Id),

    /// No [`Identity`] owns the provided [`Email`].
    ///
    /// [`Email`]: identity::Email
    #[display("No `Identity` owns `{_0}` email")]
    #[from(ignore)]
    UnknownEmail(#[error(not(source))] identity::Email),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        command::{ActivateMembership, Command as _},
        domain::{membership::Role, tenant},
        testing,
    };

    use super::{ExecutionError, InviteMember};

    #[tokio::test]
    async fn invite_then_activate() {
        let (service, mem) = testing::service();
        let admin = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        mem.given_membership(&admin, &tenant, Role::Admin);
        let invitee = mem.given_identity("bob@clinic.example", "s3cret");

        let output = service
            .execute(InviteMember {
                tenant_id: tenant.id,
                email: invitee.email.clone(),
                role: Role::User,
                ttl: Duration::from_secs(7 * 24 * 60 * 60),
            })
            .await
            .unwrap();
        assert!(!output.membership.is_operable());

        let activated = service
            .execute(ActivateMembership {
                token: output.token.value.clone(),
            })
            .await
            .unwrap();
        assert_eq!(activated.memberships.len(), 1);
        assert!(activated.memberships[0].is_operable());
    }

    #[tokio::test]
    async fn respects_seat_limit() {
        let (service, mem) = testing::service();
        let tenant = mem.given_tenant_with_seats("Bright Smiles", 1);
        let admin = mem.given_identity("amelia@clinic.example", "s3cret");
        mem.given_membership(&admin, &tenant, Role::Admin);
        let invitee = mem.given_identity("bob@clinic.example", "s3cret");

        let err = service
            .execute(InviteMember {
                tenant_id: tenant.id,
                email: invitee.email.clone(),
                role: Role::User,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::SeatLimitExceeded(limit)
                if i32::from(*limit) == 1,
        ));
    }

    #[tokio::test]
    async fn rejects_double_invite() {
        let (service, mem) = testing::service();
        let tenant = mem.given_tenant("Bright Smiles", true);
        let member = mem.given_identity("bob@clinic.example", "s3cret");
        mem.given_membership(&member, &tenant, Role::User);

        let err = service
            .execute(InviteMember {
                tenant_id: tenant.id,
                email: member.email.clone(),
                role: Role::User,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AlreadyMember));
    }
}
