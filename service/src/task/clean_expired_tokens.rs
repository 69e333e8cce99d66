//! [`CleanExpiredTokens`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Delete, Perform, Start},
    DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{token, Token},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`CleanExpiredTokens`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between expired [`Token`]s cleaning.
    pub interval: time::Duration,
}

/// [`Task`] for cleaning expired [`Token`]s.
///
/// Expired [`Token`]s fail every redemption on their own: this [`Task`] only
/// keeps the storage from accumulating dead rows.
#[derive(Clone, Copy, Debug)]
pub struct CleanExpiredTokens<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<CleanExpiredTokens<Self>, Config>>> for Service<Db>
where
    CleanExpiredTokens<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CleanExpiredTokens<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CleanExpiredTokens {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::CleanExpiredTokens` failed: {e}");
            });
        }
    }
}

impl<Db> Task<Perform<()>> for CleanExpiredTokens<Service<Db>>
where
    Db: Database<
        Delete<By<Token, token::ExpirationDateTime>>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline = DateTime::now().coerce();
        self.service
            .database()
            .execute(Delete(By::new(deadline)))
            .await
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Error of [`CleanExpiredTokens`] execution.
pub type ExecutionError = Traced<database::Error>;
