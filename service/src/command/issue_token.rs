//! [`Command`] for issuing a [`Token`].

use std::time::Duration;

use common::{
    operations::{By, Insert, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::identity::Email;
use crate::{
    domain::{identity, token, Identity, Token},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for issuing a single-use [`Token`].
///
/// Only persists the [`Token`]: delivering it to its [`Email`] is the
/// caller's job. Outstanding [`Token`]s of the same [`Email`] and
/// [`token::Purpose`] stay valid.
#[derive(Clone, Debug)]
pub struct IssueToken {
    /// [`Email`] to bind the [`Token`] to.
    pub email: identity::Email,

    /// [`token::Purpose`] the [`Token`] may be redeemed for.
    pub purpose: token::Purpose,

    /// Time the [`Token`] stays redeemable for.
    pub ttl: Duration,
}

impl<Db> Command<IssueToken> for Service<Db>
where
    Db: for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<Insert<Token>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Token;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: IssueToken) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let IssueToken {
            email,
            purpose,
            ttl,
        } = cmd;

        // A `Token` must always be redeemable for a live `Identity`.
        drop(
            self.database()
                .execute(Select(By::new(&email)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::UnknownEmail(email.clone()))
                .map_err(tracerr::wrap!())?,
        );

        let now = DateTime::now();
        let token = Token {
            value: token::Value::generate(),
            email,
            purpose,
            created_at: now.coerce(),
            expires_at: (now + ttl).coerce(),
        };

        self.database()
            .execute(Insert(token.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(token)
    }
}

/// Error of [`IssueToken`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// No [`Identity`] owns the provided [`Email`].
    #[display("No `Identity` owns `{_0}` email")]
    #[from(ignore)]
    UnknownEmail(#[error(not(source))] identity::Email),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        command::Command as _,
        domain::{identity, token},
        testing,
    };

    use super::{ExecutionError, IssueToken};

    #[tokio::test]
    async fn issues_for_known_email() {
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

        assert_eq!(token.email, identity.email);
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn rejects_unknown_email() {
        let (service, _) = testing::service();

        let err = service
            .execute(IssueToken {
                email: identity::Email::new("ghost@clinic.example").unwrap(),
                purpose: token::Purpose::PasswordReset,
                ttl: Duration::from_secs(600),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownEmail(_)));
    }

    #[tokio::test]
    async fn reissuing_keeps_prior_tokens_valid() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let issue = IssueToken {
            email: identity.email.clone(),
            purpose: token::Purpose::PasswordReset,
            ttl: Duration::from_secs(600),
        };
        let first = service.execute(issue.clone()).await.unwrap();
        let second = service.execute(issue).await.unwrap();

        assert_ne!(first.value, second.value);
        assert!(mem.token_exists(&first.value));
        assert!(mem.token_exists(&second.value));
    }
}
