//! [`Command`] for creating a [`Session`].

use std::time::Duration;

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::identity::{session::Token, Email, Password};
use crate::{
    domain::{
        identity::{self, session, Session},
        membership, tenant, Identity, Membership, Tenant,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
#[derive(Clone, Debug, From)]
pub enum CreateIdentitySession {
    /// Create a new [`Session`] by [`Identity`] credentials.
    ByCredentials {
        /// [`Email`] of an [`Identity`].
        email: identity::Email,

        /// [`Password`] of an [`Identity`].
        password: SecretBox<identity::Password>,
    },

    /// Create a new [`Session`] by [`Identity`] ID.
    ///
    /// Used after registration and after a token redemption, where the
    /// [`Identity`] is already proven.
    ByIdentityId(identity::Id),
}

impl CreateIdentitySession {
    /// [`Duration`] of [`Session`] expiration.
    const EXPIRATION_DURATION: Duration =
        Duration::from_secs(30 * 24 * 60 * 60);
}

/// Output of [`CreateIdentitySession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// Claims of the created [`Session`].
    pub session: Session,

    /// [`Identity`] whose [`Session`] has been created.
    pub identity: Identity,
}

impl<Db> Command<CreateIdentitySession> for Service<Db>
where
    Db: Database<
            Select<By<Option<Identity>, identity::Id>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
            Ok = Option<Membership>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Tenant>, tenant::Id>>,
            Ok = Option<Tenant>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateIdentitySession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateIdentitySession as Cmd;
        use ExecutionError as E;

        let identity = match cmd {
            Cmd::ByCredentials { email, password } => {
                let identity = self
                    .database()
                    .execute(Select(By::new(&email)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or_else(|| E::WrongCredentials)
                    .map_err(tracerr::wrap!())?;

                if !identity.password_hash.verify(password.expose_secret()) {
                    return Err(tracerr::new!(E::WrongCredentials));
                }

                identity
            }
            Cmd::ByIdentityId(identity_id) => self
                .database()
                .execute(Select(By::new(identity_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::IdentityNotExists(identity_id))
                .map_err(tracerr::wrap!())?,
        };

        // The preferred `Tenant` becomes the active `Membership` only while
        // both sides remain operable right now.
        let mut membership = None;
        if let Some(tenant_id) = identity.preferred_tenant {
            let found = self
                .database()
                .execute(Select(By::new((identity.id, tenant_id))))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(Membership::is_operable);
            if let Some(found) = found {
                let tenant = self
                    .database()
                    .execute(Select(By::new(tenant_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .filter(Tenant::is_operable);
                if tenant.is_some() {
                    membership = Some(session::Membership {
                        tenant_id,
                        role: found.role,
                    });
                }
            }
        }

        let expires_at =
            (DateTime::now() + Cmd::EXPIRATION_DURATION).coerce();
        let claims = Session {
            identity_id: identity.id,
            membership,
            expires_at,
        };
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &claims,
            &self.config.jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        Ok(Output {
            token,
            session: claims,
            identity,
        })
    }
}

/// Error of [`CreateIdentitySession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`Identity`] with the provided ID does not exist.
    #[display("`Identity(id: {_0})` does not exist")]
    #[from(ignore)]
    IdentityNotExists(#[error(not(source))] identity::Id),

    /// [`CreateIdentitySession::ByCredentials`] contains wrong credentials.
    #[display("Wrong `Identity` credentials")]
    WrongCredentials,
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::{AuthorizeIdentitySession, Command as _},
        domain::identity,
        testing,
    };

    use super::{CreateIdentitySession, ExecutionError};

    #[tokio::test]
    async fn logs_in_by_credentials() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let output = service
            .execute(CreateIdentitySession::ByCredentials {
                email: identity.email.clone(),
                password: SecretBox::init_with(|| {
                    identity::Password::new("s3cret").unwrap()
                }),
            })
            .await
            .unwrap();

        assert_eq!(output.identity.id, identity.id);
        assert!(output.session.membership.is_none());
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let err = service
            .execute(CreateIdentitySession::ByCredentials {
                email: identity.email.clone(),
                password: SecretBox::init_with(|| {
                    identity::Password::new("guess").unwrap()
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
    }

    #[tokio::test]
    async fn rejects_unknown_email() {
        let (service, _) = testing::service();

        let err = service
            .execute(CreateIdentitySession::ByCredentials {
                email: identity::Email::new("ghost@clinic.example").unwrap(),
                password: SecretBox::init_with(|| {
                    identity::Password::new("s3cret").unwrap()
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
    }

    #[tokio::test]
    async fn issued_token_round_trips() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let output = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap();
        let decoded = service
            .execute(AuthorizeIdentitySession {
                token: output.token,
            })
            .await
            .unwrap();

        assert_eq!(decoded.identity_id, output.session.identity_id);
        assert_eq!(
            decoded.expires_at.unix_timestamp(),
            output.session.expires_at.unix_timestamp(),
        );
        assert!(decoded.membership.is_none());
    }

    #[tokio::test]
    async fn embeds_preferred_tenant_membership() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        mem.given_membership(
            &identity,
            &tenant,
            crate::domain::membership::Role::Admin,
        );
        mem.prefer_tenant(&identity, &tenant);

        let output = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap();

        let membership = output.session.membership.unwrap();
        assert_eq!(membership.tenant_id, tenant.id);
    }

    #[tokio::test]
    async fn skips_banned_preferred_membership() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        let membership = mem.given_membership(
            &identity,
            &tenant,
            crate::domain::membership::Role::User,
        );
        mem.prefer_tenant(&identity, &tenant);
        mem.ban_membership(&membership);

        let output = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap();

        assert!(output.session.membership.is_none());
    }
}
