//! GraphQL [`Query`]s definitions.

use juniper::graphql_object;
use service::{
    command::{Access, Requirement},
    query, Query as _,
};

use crate::{api, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the currently authenticated `Identity`.
    ///
    /// Unauthenticated callers receive the `Redirect` to the sign-in page.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myIdentity",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_identity(
        ctx: &Context,
    ) -> Result<api::identity::IdentityResult, Error> {
        use api::identity::IdentityResult as R;

        match ctx.authorize(Requirement::Session).await? {
            Access::Granted(grant) => {
                #[expect(
                    unsafe_code,
                    reason = "granted `Session` proves `Identity` existence"
                )]
                let identity = unsafe {
                    api::Identity::new_unchecked(grant.session.identity_id)
                };
                Ok(R::Identity(identity))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Returns the `Membership`s of the currently authenticated `Identity`,
    /// for the tenant-selection page.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myMemberships",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_memberships(
        ctx: &Context,
    ) -> Result<api::tenant::MembershipsResult, Error> {
        use api::tenant::MembershipsResult as R;

        match ctx.authorize(Requirement::Session).await? {
            Access::Granted(grant) => {
                let memberships = ctx
                    .service()
                    .execute(query::membership::OfIdentity::by(
                        grant.session.identity_id,
                    ))
                    .await
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?
                    .into_iter()
                    .filter(|m| m.deleted_at.is_none())
                    .map(Into::into)
                    .collect();
                Ok(R::Memberships(api::tenant::MembershipList {
                    memberships,
                }))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Returns the clinic the current `Session` actively acts in.
    ///
    /// Callers without an operable active `Membership` receive the
    /// `Redirect` to the tenant-selection page.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "currentTenant",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn current_tenant(
        ctx: &Context,
    ) -> Result<api::tenant::TenantResult, Error> {
        use api::tenant::TenantResult as R;

        match ctx.authorize(Requirement::Membership).await? {
            Access::Granted(grant) => {
                let tenant = grant.tenant.ok_or_else(|| {
                    ctx.error()(Error::internal(
                        &"`Membership` grant is missing its `Tenant`",
                    ))
                })?;
                Ok(R::Tenant(tenant.into()))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Returns the staff `Membership`s of the active clinic.
    ///
    /// A members-only feature: clinics with an inactive subscription are
    /// routed to the resume-subscription flow, except for `ADMIN` callers.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myColleagues",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_colleagues(
        ctx: &Context,
    ) -> Result<api::tenant::MembershipsResult, Error> {
        use api::tenant::MembershipsResult as R;

        match ctx.authorize(Requirement::ActiveSubscription).await? {
            Access::Granted(grant) => {
                let tenant = grant.tenant.ok_or_else(|| {
                    ctx.error()(Error::internal(
                        &"`ActiveSubscription` grant is missing its `Tenant`",
                    ))
                })?;
                let memberships = ctx
                    .service()
                    .execute(query::membership::OfTenant::by(tenant.id))
                    .await
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?
                    .into_iter()
                    .filter(|m| m.deleted_at.is_none())
                    .map(Into::into)
                    .collect();
                Ok(R::Memberships(api::tenant::MembershipList {
                    memberships,
                }))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }
}
