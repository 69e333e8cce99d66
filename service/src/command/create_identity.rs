//! [`Command`] for creating a new [`Identity`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::identity::{AvatarUrl, Email, Name, Password};
use crate::{
    domain::{identity, Identity},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Identity`].
#[derive(Clone, Debug)]
pub struct CreateIdentity {
    /// [`Name`] of a new [`Identity`].
    pub name: identity::Name,

    /// [`Email`] of a new [`Identity`].
    pub email: identity::Email,

    /// [`Password`] of a new [`Identity`].
    pub password: SecretBox<identity::Password>,

    /// [`AvatarUrl`] of a new [`Identity`].
    pub avatar_url: Option<identity::AvatarUrl>,
}

impl<Db> Command<CreateIdentity> for Service<Db>
where
    Db: for<'e> Database<
            Select<By<Option<Identity>, &'e identity::Email>>,
            Ok = Option<Identity>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Identity>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Identity;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateIdentity,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateIdentity {
            name,
            email,
            password,
            avatar_url,
        } = cmd;

        let existing = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let identity = Identity {
            id: identity::Id::new(),
            name,
            email,
            password_hash: identity::PasswordHash::new(
                password.expose_secret(),
            ),
            avatar_url,
            preferred_tenant: None,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(identity.clone()))
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

/// Error of [`CreateIdentity`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`identity::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    EmailOccupied(#[error(not(source))] identity::Email),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{command::Command as _, domain::identity, testing};

    use super::{CreateIdentity, ExecutionError};

    fn cmd(email: &str) -> CreateIdentity {
        CreateIdentity {
            name: identity::Name::new("Dr. Amelia Reyes").unwrap(),
            email: identity::Email::new(email).unwrap(),
            password: SecretBox::init_with(|| {
                identity::Password::new("s3cret").unwrap()
            }),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn registers_identity() {
        let (service, mem) = testing::service();

        let identity = service
            .execute(cmd("amelia@clinic.example"))
            .await
            .unwrap();

        assert!(mem.identity_exists(identity.id));
        assert!(identity.preferred_tenant.is_none());
    }

    #[tokio::test]
    async fn rejects_occupied_email() {
        let (service, mem) = testing::service();
        drop(mem.given_identity("amelia@clinic.example", "s3cret"));

        let err = service
            .execute(cmd("amelia@clinic.example"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }
}
