//! [`Command`] for renaming a [`Tenant`].

use common::operations::{By, Commit, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{tenant, Tenant},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for renaming a [`Tenant`].
#[derive(Clone, Debug)]
pub struct UpdateTenantName {
    /// ID of the [`Tenant`] to rename.
    pub tenant_id: tenant::Id,

    /// New [`tenant::Name`] to set.
    pub name: tenant::Name,
}

impl<Db> Command<UpdateTenantName> for Service<Db>
where
    Db: Database<
            Select<By<Option<Tenant>, tenant::Id>>,
            Ok = Option<Tenant>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Update<Tenant>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Tenant;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateTenantName,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateTenantName { tenant_id, name } = cmd;

        let mut tenant = self
            .database()
            .execute(Select(By::new(tenant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TenantNotExists(tenant_id))
            .map_err(tracerr::wrap!())?;
        tenant.name = name;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Update(tenant.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(tenant)
    }
}

/// Error of [`UpdateTenantName`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Tenant`] with the provided ID does not exist.
    #[display("`Tenant(id: {_0})` does not exist")]
    #[from(ignore)]
    TenantNotExists(#[error(not(source))] tenant::Id),
}

#[cfg(test)]
mod spec {
    use crate::{command::Command as _, domain::tenant, testing};

    use super::UpdateTenantName;

    #[tokio::test]
    async fn renames_tenant() {
        let (service, mem) = testing::service();
        let tenant = mem.given_tenant("Bright Smiles", true);

        let updated = service
            .execute(UpdateTenantName {
                tenant_id: tenant.id,
                name: tenant::Name::new("Brighter Smiles").unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(updated.name.to_string(), "Brighter Smiles");
        assert_eq!(updated.id, tenant.id);
    }
}
