//! [`Token`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{token, Token},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Restores a [`Token`] from the provided [`Row`].
fn from_row(row: &Row) -> Token {
    Token {
        value: row.get("value"),
        email: row.get("email"),
        purpose: row.get("purpose"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }
}

impl<C> Database<Insert<Token>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(token): Insert<Token>,
    ) -> Result<Self::Ok, Self::Err> {
        let Token {
            value,
            email,
            purpose,
            created_at,
            expires_at,
        } = token;

        const SQL: &str = "\
            INSERT INTO tokens (\
                value, email, purpose, created_at, expires_at\
            ) \
            VALUES (\
                $1::VARCHAR, $2::VARCHAR, $3::INT2, \
                $4::TIMESTAMPTZ, $5::TIMESTAMPTZ\
            )";
        self.exec(SQL, &[&value, &email, &purpose, &created_at, &expires_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<'v, C> Database<Select<By<Option<Token>, &'v token::Value>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Token>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Token>, &'v token::Value>>,
    ) -> Result<Self::Ok, Self::Err> {
        let value = by.into_inner();

        const SQL: &str = "\
            SELECT value, email, purpose, created_at, expires_at \
            FROM tokens \
            WHERE value = $1::VARCHAR \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&value])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

impl<'v, C>
    Database<Delete<By<Option<Token>, (&'v token::Value, token::Purpose)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Token>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<
            By<Option<Token>, (&'v token::Value, token::Purpose)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (value, purpose) = by.into_inner();

        // Single conditional statement: of any number of concurrent
        // redemptions exactly one observes the returned row.
        const SQL: &str = "\
            DELETE FROM tokens \
            WHERE value = $1::VARCHAR \
              AND purpose = $2::INT2 \
              AND expires_at > NOW() \
            RETURNING value, email, purpose, created_at, expires_at";
        Ok(self
            .query_opt(SQL, &[&value, &purpose])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

impl<C> Database<Delete<By<Token, token::ExpirationDateTime>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Token, token::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: token::ExpirationDateTime = by.into_inner();

        const SQL: &str = "\
            DELETE FROM tokens \
            WHERE expires_at <= $1::TIMESTAMPTZ";
        self.exec(SQL, &[&deadline])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
