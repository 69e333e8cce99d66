//! [`Command`] for resetting a forgotten password.

use common::operations::{
    By, Commit, Delete, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::identity::Password;
use crate::{
    domain::{identity, token, Identity, Token},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for resetting a forgotten password via a
/// [`token::Purpose::PasswordReset`] [`Token`].
///
/// Redemption and the password update share one transaction: a failure
/// mid-way leaves the [`Token`] fully valid and retryable.
#[derive(Clone, Debug)]
pub struct ResetIdentityPassword {
    /// [`token::Value`] of the reset [`Token`].
    pub token: token::Value,

    /// New [`Password`] to set.
    pub new_password: SecretBox<identity::Password>,
}

impl<Db> Command<ResetIdentityPassword> for Service<Db>
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
        > + Database<Update<Identity>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Identity;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ResetIdentityPassword,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ResetIdentityPassword {
            token: value,
            new_password,
        } = cmd;

        let token = self
            .database()
            .execute(Select(By::new(&value)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TokenNotFound)
            .map_err(tracerr::wrap!())?;
        if token.purpose != token::Purpose::PasswordReset {
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
            .execute(Delete(By::new((
                &value,
                token::Purpose::PasswordReset,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TokenNotFound)
            .map_err(tracerr::wrap!())?;
        let mut identity = tx
            .execute(Select(By::new(&token.email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::IdentityNotExists(token.email))
            .map_err(tracerr::wrap!())?;
        identity.password_hash =
            identity::PasswordHash::new(new_password.expose_secret());
        tx.execute(Update(identity.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(identity)
    }
}

/// Error of [`ResetIdentityPassword`] [`Command`] execution.
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

    use secrecy::SecretBox;

    use crate::{
        command::{Command as _, CreateIdentitySession, IssueToken},
        domain::{identity, token},
        testing,
    };

    use super::{ExecutionError, ResetIdentityPassword};

    #[tokio::test]
    async fn resets_password_and_burns_token() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "old pass");
        let token = service
            .execute(IssueToken {
                email: identity.email.clone(),
                purpose: token::Purpose::PasswordReset,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap();

        let reset = ResetIdentityPassword {
            token: token.value.clone(),
            new_password: SecretBox::init_with(|| {
                identity::Password::new("new pass").unwrap()
            }),
        };
        let updated = service.execute(reset.clone()).await.unwrap();
        assert!(updated.password_hash.verify(
            &identity::Password::new("new pass").unwrap(),
        ));

        // New credentials work, old ones do not.
        let login = service
            .execute(CreateIdentitySession::ByCredentials {
                email: identity.email.clone(),
                password: SecretBox::init_with(|| {
                    identity::Password::new("new pass").unwrap()
                }),
            })
            .await;
        assert!(login.is_ok());

        // Second redemption of the same link fails.
        let err = service.execute(reset).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::TokenNotFound));
    }

    #[tokio::test]
    async fn rejects_magic_link_token() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let token = service
            .execute(IssueToken {
                email: identity.email.clone(),
                purpose: token::Purpose::MagicLink,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap();

        let err = service
            .execute(ResetIdentityPassword {
                token: token.value.clone(),
                new_password: SecretBox::init_with(|| {
                    identity::Password::new("new pass").unwrap()
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::TokenPurposeMismatch(token::Purpose::MagicLink),
        ));
        assert!(mem.token_exists(&token.value));
    }
}
