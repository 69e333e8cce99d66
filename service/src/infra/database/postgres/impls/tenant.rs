//! [`Tenant`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{tenant, Tenant},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Tenant>, tenant::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Tenant>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Tenant>, tenant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, plan, seat_limit, active_subscription, \
                   created_at, disabled_at, deleted_at \
            FROM tenants \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Tenant {
                id: row.get("id"),
                name: row.get("name"),
                plan: row.get("plan"),
                seat_limit: row.get("seat_limit"),
                active_subscription: row.get("active_subscription"),
                created_at: row.get("created_at"),
                disabled_at: row.get("disabled_at"),
                deleted_at: row.get("deleted_at"),
            }))
    }
}

impl<C> Database<Insert<Tenant>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Tenant>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(tenant): Insert<Tenant>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(tenant)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Tenant>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(tenant): Update<Tenant>,
    ) -> Result<Self::Ok, Self::Err> {
        let Tenant {
            id,
            name,
            plan,
            seat_limit,
            active_subscription,
            created_at,
            disabled_at,
            deleted_at,
        } = tenant;

        const SQL: &str = "\
            INSERT INTO tenants (\
                id, name, plan, seat_limit, active_subscription, \
                created_at, disabled_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, $3::VARCHAR, $4::INT4, $5::BOOL, \
                $6::TIMESTAMPTZ, $7::TIMESTAMPTZ, $8::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                plan = EXCLUDED.plan, \
                seat_limit = EXCLUDED.seat_limit, \
                active_subscription = EXCLUDED.active_subscription, \
                created_at = EXCLUDED.created_at, \
                disabled_at = EXCLUDED.disabled_at, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &name,
                &plan,
                &seat_limit,
                &active_subscription,
                &created_at,
                &disabled_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
