//! [`Command`] for redeeming a [`Token`].

use common::operations::{By, Delete, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{identity, token, Identity, Token},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for redeeming a single-use [`Token`].
///
/// Exactly one of any number of concurrent redemptions of the same [`Token`]
/// succeeds: the conditional delete is a single atomic step of the
/// persistence layer.
#[derive(Clone, Debug)]
pub struct ConsumeToken {
    /// [`token::Value`] to redeem.
    pub value: token::Value,

    /// [`token::Purpose`] the caller redeems the [`Token`] for.
    ///
    /// Implied by the route the [`token::Value`] arrived on.
    pub purpose: token::Purpose,
}

impl<Db> Command<ConsumeToken> for Service<Db>
where
    Db: for<'v> Database<
            Select<By<Option<Token>, &'v token::Value>>,
            Ok = Option<Token>,
            Err = Traced<database::Error>,
        > + for<'v> Database<
            Delete<By<Option<Token>, (&'v token::Value, token::Purpose)>>,
            Ok = Option<Token>,
            Err = Traced<database::Error>,
        > + for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Identity;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ConsumeToken) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConsumeToken { value, purpose } = cmd;

        let token = self
            .database()
            .execute(Select(By::new(&value)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::NotFound)
            .map_err(tracerr::wrap!())?;

        // A mismatched purpose must not burn the `Token`: redeeming it for
        // the right purpose afterwards still succeeds.
        if token.purpose != purpose {
            return Err(tracerr::new!(E::PurposeMismatch(token.purpose)));
        }
        if token.is_expired() {
            return Err(tracerr::new!(E::Expired));
        }

        // Single conditional delete: the loser of a concurrent redemption
        // race observes no row here.
        let token = self
            .database()
            .execute(Delete(By::new((&value, purpose))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::NotFound)
            .map_err(tracerr::wrap!())?;

        self.database()
            .execute(Select(By::new(&token.email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::IdentityNotExists(token.email))
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`ConsumeToken`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Token`] is past its expiry.
    #[display("`Token` is expired")]
    Expired,

    /// No [`Identity`] owns the [`Email`] the [`Token`] is bound to.
    ///
    /// [`Email`]: identity::Email
    #[display("No `Identity` owns `{_0}` email")]
    IdentityNotExists(#[error(not(source))] identity::Email),

    /// [`Token`] does not exist or has already been redeemed.
    #[display("`Token` does not exist")]
    NotFound,

    /// [`Token`] is tagged for a different [`token::Purpose`].
    #[display("`Token` is issued for `{_0}` purpose")]
    PurposeMismatch(#[error(not(source))] token::Purpose),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use futures::future;

    use crate::{
        command::{Command as _, IssueToken},
        domain::{token, Token},
        testing,
    };

    use super::{ConsumeToken, ExecutionError};

    async fn issued(
        service: &testing::MemService,
        mem: &testing::Mem,
        purpose: token::Purpose,
        ttl: Duration,
    ) -> Token {
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        service
            .execute(IssueToken {
                email: identity.email.clone(),
                purpose,
                ttl,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn consumes_exactly_once() {
        let (service, mem) = testing::service();
        let token = issued(
            &service,
            &mem,
            token::Purpose::MagicLink,
            Duration::from_secs(600),
        )
        .await;

        let consume = ConsumeToken {
            value: token.value.clone(),
            purpose: token::Purpose::MagicLink,
        };
        let identity = service.execute(consume.clone()).await.unwrap();
        assert_eq!(identity.email, token.email);

        let err = service.execute(consume).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_redemption_has_one_winner() {
        let (service, mem) = testing::service();
        let token = issued(
            &service,
            &mem,
            token::Purpose::MagicLink,
            Duration::from_secs(600),
        )
        .await;

        let consume = ConsumeToken {
            value: token.value.clone(),
            purpose: token::Purpose::MagicLink,
        };
        let (left, right) = future::join(
            service.execute(consume.clone()),
            service.execute(consume),
        )
        .await;

        assert_eq!(
            [left.is_ok(), right.is_ok()].iter().filter(|ok| **ok).count(),
            1,
        );
    }

    #[tokio::test]
    async fn mismatched_purpose_is_not_consumed() {
        let (service, mem) = testing::service();
        let token = issued(
            &service,
            &mem,
            token::Purpose::PasswordReset,
            Duration::from_secs(600),
        )
        .await;

        let err = service
            .execute(ConsumeToken {
                value: token.value.clone(),
                purpose: token::Purpose::MagicLink,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PurposeMismatch(token::Purpose::PasswordReset),
        ));

        // The failed attempt must not have burnt the `Token`.
        let identity = service
            .execute(ConsumeToken {
                value: token.value.clone(),
                purpose: token::Purpose::PasswordReset,
            })
            .await
            .unwrap();
        assert_eq!(identity.email, token.email);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (service, mem) = testing::service();
        let token = issued(
            &service,
            &mem,
            token::Purpose::Activation,
            Duration::ZERO,
        )
        .await;

        let err = service
            .execute(ConsumeToken {
                value: token.value.clone(),
                purpose: token::Purpose::Activation,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Expired));
    }

    #[tokio::test]
    async fn unknown_value_is_rejected() {
        let (service, _) = testing::service();

        let err = service
            .execute(ConsumeToken {
                value: token::Value::generate(),
                purpose: token::Purpose::MagicLink,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotFound));
    }
}
