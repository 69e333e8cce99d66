//! [`Membership`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{identity, tenant, Membership},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Restores a [`Membership`] from the provided [`Row`].
fn from_row(row: &Row) -> Membership {
    Membership {
        identity_id: row.get("identity_id"),
        tenant_id: row.get("tenant_id"),
        role: row.get("role"),
        created_at: row.get("created_at"),
        activated_at: row.get("activated_at"),
        banned_at: row.get("banned_at"),
        deleted_at: row.get("deleted_at"),
    }
}

impl<C> Database<Select<By<Option<Membership>, (identity::Id, tenant::Id)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (identity_id, tenant_id) = by.into_inner();

        const SQL: &str = "\
            SELECT identity_id, tenant_id, role, \
                   created_at, activated_at, banned_at, deleted_at \
            FROM memberships \
            WHERE identity_id = $1::UUID \
              AND tenant_id = $2::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&identity_id, &tenant_id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

impl<C> Database<Select<By<Vec<Membership>, identity::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Membership>, identity::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let identity_id = by.into_inner();

        const SQL: &str = "\
            SELECT identity_id, tenant_id, role, \
                   created_at, activated_at, banned_at, deleted_at \
            FROM memberships \
            WHERE identity_id = $1::UUID \
            ORDER BY created_at";
        Ok(self
            .query(SQL, &[&identity_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Membership>, tenant::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Membership>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Membership>, tenant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let tenant_id = by.into_inner();

        const SQL: &str = "\
            SELECT identity_id, tenant_id, role, \
                   created_at, activated_at, banned_at, deleted_at \
            FROM memberships \
            WHERE tenant_id = $1::UUID \
            ORDER BY created_at";
        Ok(self
            .query(SQL, &[&tenant_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Membership>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Membership>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(membership): Insert<Membership>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(membership))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Membership>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(membership): Update<Membership>,
    ) -> Result<Self::Ok, Self::Err> {
        let Membership {
            identity_id,
            tenant_id,
            role,
            created_at,
            activated_at,
            banned_at,
            deleted_at,
        } = membership;

        const SQL: &str = "\
            INSERT INTO memberships (\
                identity_id, tenant_id, role, \
                created_at, activated_at, banned_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::INT2, \
                $4::TIMESTAMPTZ, $5::TIMESTAMPTZ, \
                $6::TIMESTAMPTZ, $7::TIMESTAMPTZ\
            ) \
            ON CONFLICT (identity_id, tenant_id) DO UPDATE \
            SET role = EXCLUDED.role, \
                created_at = EXCLUDED.created_at, \
                activated_at = EXCLUDED.activated_at, \
                banned_at = EXCLUDED.banned_at, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &identity_id,
                &tenant_id,
                &role,
                &created_at,
                &activated_at,
                &banned_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
