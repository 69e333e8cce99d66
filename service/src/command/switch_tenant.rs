//! [`Command`] for switching the active [`Membership`] of a [`Session`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        identity::{self, session, Session},
        tenant, Identity, Membership, Tenant,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] re-issuing a [`Session`] with a different active
/// [`Membership`].
///
/// Switching never extends a [`Session`]: the re-issued one keeps the
/// original expiry. Concurrent switches race last-writer-wins on the
/// client-held cookie, which is acceptable.
#[derive(Clone, Debug)]
pub enum SwitchTenant {
    /// Activate the [`Membership`] of the provided [`Tenant`].
    ///
    /// When no operable [`Membership`] exists there, the [`Session`] is
    /// re-issued with no active [`Membership`] instead: a soft failure
    /// routing back to tenant selection, not an error.
    Activate {
        /// Current [`Session`] claims.
        session: Session,

        /// ID of the [`Tenant`] to act in.
        tenant: tenant::Id,
    },

    /// Clear the active [`Membership`], routing back to tenant selection.
    Clear {
        /// Current [`Session`] claims.
        session: Session,
    },
}

/// Output of [`SwitchTenant`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`session::Token`] of the re-issued [`Session`].
    pub token: session::Token,

    /// Claims of the re-issued [`Session`].
    pub session: Session,
}

impl<Db> Command<SwitchTenant> for Service<Db>
where
    Db: Database<
            Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
            Ok = Option<Membership>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Tenant>, tenant::Id>>,
            Ok = Option<Tenant>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Identity>, identity::Id>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<Update<Identity>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SwitchTenant) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let (session, membership) = match cmd {
            SwitchTenant::Activate { session, tenant } => {
                let found = self
                    .database()
                    .execute(Select(By::new((session.identity_id, tenant))))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .filter(Membership::is_operable);
                let membership = match found {
                    Some(found) => self
                        .database()
                        .execute(Select(By::new(tenant)))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?
                        .filter(Tenant::is_operable)
                        .map(|_| session::Membership {
                            tenant_id: tenant,
                            role: found.role,
                        }),
                    None => None,
                };

                if membership.is_some() {
                    // Remember the choice as the default for future logins.
                    let mut identity = self
                        .database()
                        .execute(Select(By::new(session.identity_id)))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?
                        .ok_or_else(|| {
                            E::IdentityNotExists(session.identity_id)
                        })
                        .map_err(tracerr::wrap!())?;
                    identity.preferred_tenant = Some(tenant);
                    self.database()
                        .execute(Update(identity))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?;
                }

                (session, membership)
            }
            SwitchTenant::Clear { session } => (session, None),
        };

        let claims = Session {
            identity_id: session.identity_id,
            membership,
            expires_at: session.expires_at,
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
        })
    }
}

/// Error of [`SwitchTenant`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`Identity`] the [`Session`] belongs to does not exist.
    #[display("`Identity(id: {_0})` does not exist")]
    #[from(ignore)]
    IdentityNotExists(#[error(not(source))] identity::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{Command as _, CreateIdentitySession},
        domain::membership::Role,
        testing,
    };

    use super::SwitchTenant;

    #[tokio::test]
    async fn embeds_membership_and_remembers_preference() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        mem.given_membership(&identity, &tenant, Role::Admin);

        let session = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap()
            .session;
        let output = service
            .execute(SwitchTenant::Activate {
                session,
                tenant: tenant.id,
            })
            .await
            .unwrap();

        let membership = output.session.membership.unwrap();
        assert_eq!(membership.tenant_id, tenant.id);
        assert_eq!(membership.role, Role::Admin);
        assert_eq!(mem.preferred_tenant(&identity), Some(tenant.id));
    }

    #[tokio::test]
    async fn keeps_original_expiry() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        mem.given_membership(&identity, &tenant, Role::User);

        let session = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap()
            .session;
        let output = service
            .execute(SwitchTenant::Activate {
                session,
                tenant: tenant.id,
            })
            .await
            .unwrap();

        assert_eq!(
            output.session.expires_at.unix_timestamp(),
            session.expires_at.unix_timestamp(),
        );
    }

    #[tokio::test]
    async fn foreign_tenant_clears_membership_softly() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let foreign = mem.given_tenant("Other Clinic", true);

        let session = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap()
            .session;
        let output = service
            .execute(SwitchTenant::Activate {
                session,
                tenant: foreign.id,
            })
            .await
            .unwrap();

        assert!(output.session.membership.is_none());
        assert_eq!(mem.preferred_tenant(&identity), None);
    }

    #[tokio::test]
    async fn clear_drops_membership_but_keeps_preference() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", true);
        mem.given_membership(&identity, &tenant, Role::User);
        mem.prefer_tenant(&identity, &tenant);

        let session = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap()
            .session;
        assert!(session.membership.is_some());

        let output = service
            .execute(SwitchTenant::Clear { session })
            .await
            .unwrap();

        assert!(output.session.membership.is_none());
        assert_eq!(mem.preferred_tenant(&identity), Some(tenant.id));
    }
}
