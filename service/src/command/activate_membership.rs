//! [`Command`] for activating invited [`Membership`]s.

use common::{
    operations::{By, Commit, Delete, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{identity, token, Identity, Membership, Token},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] redeeming a [`token::Purpose::Activation`] [`Token`] and
/// activating every pending [`Membership`] of the bound [`Identity`].
///
/// Redemption and the activations share one transaction, so a failure
/// mid-way leaves the [`Token`] fully valid and retryable.
#[derive(Clone, Debug)]
pub struct ActivateMembership {
    /// [`token::Value`] of the activation [`Token`].
    pub token: token::Value,
}

/// Output of [`ActivateMembership`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Identity`] the [`Token`] was bound to.
    pub identity: Identity,

    /// [`Membership`]s activated by this redemption.
    pub memberships: Vec<Membership>,
}

impl<Db> Command<ActivateMembership> for Service<Db>
where
    Db: for<'v> Database<
            Select<By<Option<Token>, &'v token::Value>>,
            Ok = Option<Token>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: for<'v> Database<
            Delete<By<Option<Token>, (&'v token::Value, token::Purpose)>>,
            Ok = Option<Token>,
            Err = Traced<database::Error>,
        > + for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Membership>, identity::Id>>,
            Ok = Vec<Membership>,
            Err = Traced<database::Error>,
        > + Database<Update<Membership>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ActivateMembership,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ActivateMembership { token: value } = cmd;

        let token = self
            .database()
            .execute(Select(By::new(&value)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TokenNotFound)
            .map_err(tracerr::wrap!())?;
        if token.purpose != token::Purpose::Activation {
            return Err(tracerr::new!(E::TokenPurposeMismatch(token.purpose)));
        }
        if token.is_expired() {
            return Err(tracerr::new!(E::TokenExpired));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let token = tx
            .execute(Delete(By::new((&value, token::Purpose::Activation))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TokenNotFound)
            .map_err(tracerr::wrap!())?;
        let identity = tx
            .execute(Select(By::new(&token.email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::IdentityNotExists(token.email))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let mut activated = Vec::new();
        for mut membership in tx
            .execute(Select(By::new(identity.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        {
            if membership.activated_at.is_some()
                || membership.banned_at.is_some()
                || membership.deleted_at.is_some()
            {
                continue;
            }
            membership.activated_at = Some(now.coerce());
            tx.execute(Update(membership))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            activated.push(membership);
        }
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(Output {
            identity,
            memberships: activated,
        })
    }
}

/// Error of [`ActivateMembership`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No [`Identity`] owns the [`Email`] the [`Token`] is bound to.
    ///
    /// [`Email`]: identity::Email
    #[display("No `Identity` owns `{_0}` email")]
    IdentityNotExists(#[error(not(source))] identity::Email),

    /// [`Token`] is past its expiry.
    #[display("`Token` is expired")]
    TokenExpired,

    /// [`Token`] does not exist or has already been redeemed.
    #[display("`Token` does not exist")]
    TokenNotFound,

    /// [`Token`] is tagged for a different [`token::Purpose`].
    #[display("`Token` is issued for `{_0}` purpose")]
    TokenPurposeMismatch(#[error(not(source))] token::Purpose),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        command::{Command as _, IssueToken},
        domain::{membership::Role, token},
        testing,
    };

    use super::ActivateMembership;

    #[tokio::test]
    async fn activates_pending_memberships_only() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let invited_to = mem.given_tenant("Bright Smiles", true);
        let pending =
            mem.given_pending_membership(&identity, &invited_to, Role::User);
        let banned_in = mem.given_tenant("Other Clinic", true);
        let banned = mem
            .given_pending_membership(&identity, &banned_in, Role::User);
        mem.ban_membership(&banned);

        let token = service
            .execute(IssueToken {
                email: identity.email.clone(),
                purpose: token::Purpose::Activation,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap();
        let output = service
            .execute(ActivateMembership {
                token: token.value.clone(),
            })
            .await
            .unwrap();

        assert_eq!(output.identity.id, identity.id);
        assert_eq!(output.memberships.len(), 1);
        assert_eq!(output.memberships[0].tenant_id, pending.tenant_id);
        assert!(output.memberships[0].is_operable());
        assert!(!mem.token_exists(&token.value));
    }
}
