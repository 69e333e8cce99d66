//! [`Command`] resolving a [`Session`] from its cookie [`Token`].

use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::identity::session::Token;
use crate::{
    domain::identity::{session, Session},
    Service,
};

use super::Command;

/// [`Command`] resolving a [`Session`] from its cookie [`Token`].
///
/// Pure signature and expiry validation: no persistent state is consulted,
/// so the result proves identity only. Callers treat any failure as "no
/// session".
#[derive(Clone, Debug, From)]
pub struct AuthorizeIdentitySession {
    /// [`Session`] [`Token`] to resolve.
    pub token: session::Token,
}

impl<Db> Command<AuthorizeIdentitySession> for Service<Db> {
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeIdentitySession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeIdentitySession { token } = cmd;

        jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(tracerr::from_and_wrap!(=> E))
    }
}

/// Error of [`AuthorizeIdentitySession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] decoding error.
    ///
    /// Covers tampered signatures, malformed cookie values and expired
    /// [`Session`]s alike.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::{
        command::Command as _,
        domain::identity::{self, Session},
        testing,
    };

    use super::{AuthorizeIdentitySession, ExecutionError};

    #[tokio::test]
    async fn rejects_expired_session() {
        let (service, _) = testing::service();
        let claims = Session {
            identity_id: identity::Id::new(),
            membership: None,
            expires_at: DateTime::UNIX_EPOCH.coerce(),
        };
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &claims,
            &service.config().jwt_encoding_key,
        )
        .unwrap();

        let err = service
            .execute(AuthorizeIdentitySession {
                token: token.parse().unwrap(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn rejects_malformed_token() {
        let (service, _) = testing::service();

        let err = service
            .execute(AuthorizeIdentitySession {
                token: "not-a-session-cookie".parse().unwrap(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }
}
