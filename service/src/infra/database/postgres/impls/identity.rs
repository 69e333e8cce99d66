//! [`Identity`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{identity, Identity},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Identity>, identity::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Identity>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Identity>, identity::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, email, password_hash, \
                   avatar_url, preferred_tenant, \
                   created_at, deleted_at \
            FROM identities \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Identity {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                password_hash: row.get("password_hash"),
                avatar_url: row.get("avatar_url"),
                preferred_tenant: row.get("preferred_tenant"),
                created_at: row.get("created_at"),
                deleted_at: row.get("deleted_at"),
            }))
    }
}

impl<'e, C> Database<Select<By<Option<Identity>, &'e identity::Email>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Identity>, identity::Id>>,
        Ok = Option<Identity>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Identity>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Identity>, &'e identity::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM identities \
            WHERE email = $1::VARCHAR \
              AND deleted_at IS NULL \
            LIMIT 1";
        let Some(row) = self
            .query_opt(SQL, &[&email])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let identity_id = row.get("id");
        self.execute(Select(By::new(identity_id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<Identity>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Identity>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(identity): Insert<Identity>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(identity))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Identity>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(identity): Update<Identity>,
    ) -> Result<Self::Ok, Self::Err> {
        let Identity {
            id,
            name,
            email,
            password_hash,
            avatar_url,
            preferred_tenant,
            created_at,
            deleted_at,
        } = identity;

        const SQL: &str = "\
            INSERT INTO identities (\
                id, name, email, password_hash, \
                avatar_url, preferred_tenant, \
                created_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, \
                $2::VARCHAR, $3::VARCHAR, $4::VARCHAR, \
                $5::VARCHAR, $6::UUID, \
                $7::TIMESTAMPTZ, $8::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                email = EXCLUDED.email, \
                password_hash = EXCLUDED.password_hash, \
                avatar_url = EXCLUDED.avatar_url, \
                preferred_tenant = EXCLUDED.preferred_tenant, \
                created_at = EXCLUDED.created_at, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &name,
                &email,
                &password_hash,
                &avatar_url,
                &preferred_tenant,
                &created_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
