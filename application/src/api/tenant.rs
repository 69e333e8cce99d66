//! [`Tenant`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{
    graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar, GraphQLUnion,
};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::{self, scalar},
    AsError, Context, Error,
};

/// A `Tenant` of the system: a clinic with its own staff and subscription.
#[derive(Clone, Debug, From)]
pub struct Tenant {
    /// ID of this [`Tenant`].
    pub id: Id,

    /// [`domain::Tenant`] representing this [`Tenant`].
    tenant: OnceCell<domain::Tenant>,
}

impl From<domain::Tenant> for Tenant {
    fn from(tenant: domain::Tenant) -> Self {
        Self {
            id: tenant.id.into(),
            tenant: OnceCell::new_with(Some(tenant)),
        }
    }
}

impl Tenant {
    /// Creates a new [`Tenant`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Tenant`] with the provided ID exists,
    /// otherwise accessing this [`Tenant`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            tenant: OnceCell::new(),
        }
    }

    /// Returns the [`domain::Tenant`] representing this [`Tenant`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Tenant`] doesn't exist.
    async fn tenant(&self, ctx: &Context) -> Result<&domain::Tenant, Error> {
        let id = self.id.into();
        self.tenant
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::tenant::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|t| {
                        future::ready(
                            t.ok_or_else(|| TenantError::NotExists.into()),
                        )
                    })
            })
            .await
    }
}

/// A `Tenant` of the system: a clinic with its own staff and subscription.
#[graphql_object(context = Context)]
impl Tenant {
    /// Unique identifier of this `Tenant`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of this `Tenant`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.name",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn name(&self, ctx: &Context) -> Result<Name, Error> {
        Ok(self.tenant(ctx).await?.name.clone().into())
    }

    /// Billing plan reference of this `Tenant`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.plan",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn plan(&self, ctx: &Context) -> Result<Option<Plan>, Error> {
        Ok(self.tenant(ctx).await?.plan.clone().map(Into::into))
    }

    /// Maximum number of staff seats of this `Tenant`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.seatLimit",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn seat_limit(&self, ctx: &Context) -> Result<i32, Error> {
        Ok(self.tenant(ctx).await?.seat_limit.into())
    }

    /// Indicator whether the subscription of this `Tenant` is active.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.activeSubscription",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn active_subscription(
        &self,
        ctx: &Context,
    ) -> Result<bool, Error> {
        Ok(self.tenant(ctx).await?.active_subscription)
    }

    /// `DateTime` when this `Tenant` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Tenant.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.tenant(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `Tenant`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::tenant::Id)]
#[into(domain::tenant::Id)]
#[graphql(name = "TenantId", transparent)]
pub struct Id(Uuid);

/// Name of a `Tenant`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "TenantName",
    with = scalar::Via::<domain::tenant::Name>,
)]
pub struct Name(domain::tenant::Name);

/// Billing plan reference of a `Tenant`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "TenantPlan",
    with = scalar::Via::<domain::tenant::Plan>,
)]
pub struct Plan(domain::tenant::Plan);

/// Role of an `Identity` in a `Tenant`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
pub enum Role {
    /// Administers the `Tenant`: staff, settings and billing.
    Admin,

    /// Regular staff member of the `Tenant`.
    User,
}

impl From<domain::membership::Role> for Role {
    fn from(role: domain::membership::Role) -> Self {
        match role {
            domain::membership::Role::Admin => Self::Admin,
            domain::membership::Role::User => Self::User,
        }
    }
}

impl From<Role> for domain::membership::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => Self::Admin,
            Role::User => Self::User,
        }
    }
}

/// `Membership` of an `Identity` in a `Tenant`.
#[derive(Clone, Copy, Debug, From)]
pub struct Membership(domain::Membership);

/// `Membership` of an `Identity` in a `Tenant`.
#[graphql_object(context = Context)]
impl Membership {
    /// `Tenant` this `Membership` belongs to.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Membership.tenant",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn tenant(&self) -> Tenant {
        #[expect(
            unsafe_code,
            reason = "`Membership` loaded from repository guarantees \
                      `Tenant` existence"
        )]
        unsafe {
            Tenant::new_unchecked(self.0.tenant_id)
        }
    }

    /// `Role` of this `Membership`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Membership.role",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn role(&self) -> Role {
        self.0.role.into()
    }

    /// Indicator whether this `Membership` may act in its `Tenant`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Membership.operable",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn operable(&self) -> bool {
        self.0.is_operable()
    }

    /// `DateTime` when this `Membership` was activated.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Membership.activatedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn activated_at(&self) -> Option<DateTime> {
        self.0.activated_at.map(common::DateTimeOf::coerce)
    }

    /// `DateTime` when this `Membership` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Membership.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }
}

/// List of `Membership`s.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context)]
pub struct MembershipList {
    /// `Membership`s of the list.
    pub memberships: Vec<Membership>,
}

/// Result of inviting a staff member into a `Tenant`.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context)]
pub struct InviteResult {
    /// Created pending `Membership`.
    pub membership: Membership,

    /// Issued activation token, to be delivered to the invitee.
    pub token: api::token::IssueResult,
}

/// Either the completed invite or the remediation `Redirect` the access gate
/// routed to instead.
#[derive(Clone, Debug, GraphQLUnion)]
#[graphql(context = Context)]
pub enum InviteMemberResult {
    /// Completed invite.
    Invite(InviteResult),

    /// Remediation `Redirect`.
    Redirect(api::Redirect),
}

/// Either the requested `Tenant` or the remediation `Redirect` the access
/// gate routed to instead.
#[derive(Clone, Debug, GraphQLUnion)]
#[graphql(context = Context)]
pub enum TenantResult {
    /// Requested `Tenant`.
    Tenant(Tenant),

    /// Remediation `Redirect`.
    Redirect(api::Redirect),
}

/// Either the requested `Membership`s or the remediation `Redirect` the
/// access gate routed to instead.
#[derive(Clone, Debug, GraphQLUnion)]
#[graphql(context = Context)]
pub enum MembershipsResult {
    /// Requested `Membership`s.
    Memberships(MembershipList),

    /// Remediation `Redirect`.
    Redirect(api::Redirect),
}

crate::define_error! {
    enum TenantError {
        #[code = "TENANT_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Tenant` with the specified ID does not exist"]
        NotExists,
    }
}
