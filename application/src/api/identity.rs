//! [`Identity`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{graphql_object, GraphQLScalar, GraphQLUnion};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::{self, scalar},
    AsError, Context, Error,
};

/// An [`Identity`] of the system: a person, independent of any clinic.
#[derive(Clone, Debug, From)]
pub struct Identity {
    /// ID of this [`Identity`].
    pub id: Id,

    /// [`domain::Identity`] representing this [`Identity`].
    identity: OnceCell<domain::Identity>,
}

impl From<domain::Identity> for Identity {
    fn from(identity: domain::Identity) -> Self {
        Self {
            id: identity.id.into(),
            identity: OnceCell::new_with(Some(identity)),
        }
    }
}

impl Identity {
    /// Creates a new [`Identity`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Identity`] with the provided ID exists,
    /// otherwise accessing this [`Identity`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            identity: OnceCell::new(),
        }
    }

    /// Returns the [`domain::Identity`] representing this [`Identity`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Identity`] doesn't exist.
    async fn identity(
        &self,
        ctx: &Context,
    ) -> Result<&domain::Identity, Error> {
        let id = self.id.into();
        self.identity
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::identity::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|i| {
                        future::ready(
                            i.ok_or_else(|| IdentityError::NotExists.into()),
                        )
                    })
            })
            .await
    }
}

/// An `Identity` of the system: a person, independent of any clinic.
#[graphql_object(context = Context)]
impl Identity {
    /// Unique identifier of this `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of this `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.name",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn name(&self, ctx: &Context) -> Result<Name, Error> {
        Ok(self.identity(ctx).await?.name.clone().into())
    }

    /// Email of this `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.email",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn email(&self, ctx: &Context) -> Result<Email, Error> {
        Ok(self.identity(ctx).await?.email.clone().into())
    }

    /// Avatar URL of this `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.avatarUrl",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn avatar_url(
        &self,
        ctx: &Context,
    ) -> Result<Option<AvatarUrl>, Error> {
        Ok(self.identity(ctx).await?.avatar_url.clone().map(Into::into))
    }

    /// Clinic this `Identity` prefers to act in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.preferredTenant",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn preferred_tenant(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::Tenant>, Error> {
        Ok(self.identity(ctx).await?.preferred_tenant.map(|id| {
            #[expect(
                unsafe_code,
                reason = "`preferred_tenant` references an existing `Tenant`"
            )]
            unsafe {
                api::Tenant::new_unchecked(id)
            }
        }))
    }

    /// `DateTime` when this `Identity` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Identity.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.identity(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of an `Identity`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::identity::Id)]
#[into(domain::identity::Id)]
#[graphql(name = "IdentityId", transparent)]
pub struct Id(Uuid);

/// Name of an `Identity`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "IdentityName",
    with = scalar::Via::<domain::identity::Name>,
)]
pub struct Name(domain::identity::Name);

/// Email of an `Identity`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "IdentityEmail",
    with = scalar::Via::<domain::identity::Email>,
)]
pub struct Email(domain::identity::Email);

/// Password of an `Identity`.
#[derive(AsRef, Clone, Debug, From, GraphQLScalar, Into)]
#[graphql(
    name = "IdentityPassword",
    with = scalar::Via::<domain::identity::Password>,
)]
pub struct Password(domain::identity::Password);

/// Avatar URL of an `Identity`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "IdentityAvatarUrl",
    with = scalar::Via::<domain::identity::AvatarUrl>,
)]
pub struct AvatarUrl(domain::identity::AvatarUrl);

/// Either the requested `Identity` or the remediation `Redirect` the access
/// gate routed to instead.
#[derive(Clone, Debug, GraphQLUnion)]
#[graphql(context = Context)]
pub enum IdentityResult {
    /// Requested `Identity`.
    Identity(Identity),

    /// Remediation `Redirect`.
    Redirect(api::Redirect),
}

crate::define_error! {
    enum IdentityError {
        #[code = "IDENTITY_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Identity` with the specified ID does not exist"]
        NotExists,
    }
}

pub mod session {
    //! [`Session`]-related definitions.
    //!
    //! [`Session`]: crate::Session

    use common::DateTime;
    use derive_more::{AsRef, From, Into};
    use juniper::{GraphQLObject, GraphQLScalar, GraphQLUnion};
    use service::{command, domain};

    use crate::{
        api::{self, scalar},
        Context,
    };

    /// `Session` cookie token.
    #[derive(AsRef, Clone, Debug, From, GraphQLScalar, Into)]
    #[graphql(
        name = "SessionToken",
        with = scalar::Via::<domain::identity::session::Token>,
    )]
    pub struct Token(domain::identity::session::Token);

    /// Result of a `Session` creation.
    ///
    /// The client stores `token` as the `session` cookie, expiring at
    /// `expires_at`.
    #[derive(Clone, Debug, From, GraphQLObject)]
    #[graphql(context = Context, name = "CreateSessionResult")]
    pub struct CreateResult {
        /// Cookie token of the created `Session`.
        pub token: Token,

        /// `Identity` associated with the created `Session`.
        pub identity: api::Identity,

        /// Clinic the created `Session` actively acts in, if any.
        pub tenant: Option<api::Tenant>,

        /// `DateTime` when the created `Session` expires.
        pub expires_at: DateTime,
    }

    impl From<command::create_identity_session::Output> for CreateResult {
        fn from(output: command::create_identity_session::Output) -> Self {
            let command::create_identity_session::Output {
                token,
                session,
                identity,
            } = output;
            Self {
                token: token.into(),
                identity: identity.into(),
                tenant: session.membership.map(|m| {
                    #[expect(
                        unsafe_code,
                        reason = "embedded `Membership` references an \
                                  existing `Tenant`"
                    )]
                    unsafe {
                        api::Tenant::new_unchecked(m.tenant_id)
                    }
                }),
                expires_at: session.expires_at.coerce(),
            }
        }
    }

    /// Result of a `Session` re-issue after a tenant switch.
    #[derive(Clone, Debug, GraphQLObject)]
    #[graphql(context = Context, name = "SwitchSessionResult")]
    pub struct SwitchResult {
        /// Cookie token of the re-issued `Session`.
        pub token: Token,

        /// Clinic the re-issued `Session` actively acts in.
        ///
        /// `null` means the switch soft-failed (or the membership was
        /// cleared) and the client belongs on the tenant-selection page.
        pub tenant: Option<api::Tenant>,

        /// `DateTime` when the re-issued `Session` expires.
        pub expires_at: DateTime,
    }

    impl From<command::switch_tenant::Output> for SwitchResult {
        fn from(output: command::switch_tenant::Output) -> Self {
            let command::switch_tenant::Output { token, session } = output;
            Self {
                token: token.into(),
                tenant: session.membership.map(|m| {
                    #[expect(
                        unsafe_code,
                        reason = "embedded `Membership` references an \
                                  existing `Tenant`"
                    )]
                    unsafe {
                        api::Tenant::new_unchecked(m.tenant_id)
                    }
                }),
                expires_at: session.expires_at.coerce(),
            }
        }
    }

    /// Either the re-issued `Session` or the remediation `Redirect` the
    /// access gate routed to instead.
    #[derive(Clone, Debug, GraphQLUnion)]
    #[graphql(context = Context)]
    pub enum SwitchTenantResult {
        /// Re-issued `Session`.
        Session(SwitchResult),

        /// Remediation `Redirect`.
        Redirect(api::Redirect),
    }
}
