//! GraphQL [`Mutation`]s definitions.

use std::time::Duration;

use juniper::graphql_object;
use service::{
    command::{self, Access, Command as _, Requirement},
    domain::{membership, token},
};

use crate::{api, define_error, AsError, Context, Error, Session};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";

    /// Redemption window of a magic-link token.
    const MAGIC_LINK_TTL: Duration = Duration::from_secs(15 * 60);

    /// Redemption window of a password-reset token.
    const PASSWORD_RESET_TTL: Duration = Duration::from_secs(60 * 60);

    /// Redemption window of a membership-activation token.
    const ACTIVATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Creates a new `Identity` and signs it in.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `EMAIL_OCCUPIED` - provided `IdentityEmail` is occupied by another
    ///                      `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createIdentity",
            email = %email,
            name = %name,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_identity(
        name: api::identity::Name,
        email: api::identity::Email,
        password: api::identity::Password,
        avatar_url: Option<api::identity::AvatarUrl>,
        ctx: &Context,
    ) -> Result<api::identity::session::CreateResult, Error> {
        let identity = ctx
            .service()
            .execute(command::CreateIdentity {
                name: name.into(),
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
                avatar_url: avatar_url.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let output = ctx
            .service()
            .execute(command::CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            identity_id: output.identity.id.into(),
            token: output.token.clone(),
            membership: output.session.membership,
            expires_at: output.session.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Creates a new `Session` with the provided credentials.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WRONG_CREDENTIALS` - provided credentials does not match any
    ///                         `Identity`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createIdentitySession",
            email = %email,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_identity_session(
        email: api::identity::Email,
        password: api::identity::Password,
        ctx: &Context,
    ) -> Result<api::identity::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::CreateIdentitySession::ByCredentials {
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            identity_id: output.identity.id.into(),
            token: output.token.clone(),
            membership: output.session.membership,
            expires_at: output.session.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Issues a magic-link token for the provided email.
    ///
    /// Delivering the link is the caller's job: this mutation only returns
    /// the token.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `UNKNOWN_EMAIL` - no `Identity` owns the provided `IdentityEmail`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "requestMagicLink",
            email = %email,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn request_magic_link(
        email: api::identity::Email,
        ctx: &Context,
    ) -> Result<api::token::IssueResult, Error> {
        ctx.service()
            .execute(command::IssueToken {
                email: email.into(),
                purpose: token::Purpose::MagicLink,
                ttl: Self::MAGIC_LINK_TTL,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Redeems a magic-link token into a new `Session`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `TOKEN_INVALID` - the link is invalid or expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "consumeMagicLink",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn consume_magic_link(
        token: api::token::Value,
        ctx: &Context,
    ) -> Result<api::identity::session::CreateResult, Error> {
        let identity = ctx
            .service()
            .execute(command::ConsumeToken {
                value: token.into(),
                purpose: token::Purpose::MagicLink,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let output = ctx
            .service()
            .execute(command::CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            identity_id: output.identity.id.into(),
            token: output.token.clone(),
            membership: output.session.membership,
            expires_at: output.session.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Issues a password-reset token for the provided email.
    ///
    /// Delivering the link is the caller's job: this mutation only returns
    /// the token.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `UNKNOWN_EMAIL` - no `Identity` owns the provided `IdentityEmail`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "requestPasswordReset",
            email = %email,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn request_password_reset(
        email: api::identity::Email,
        ctx: &Context,
    ) -> Result<api::token::IssueResult, Error> {
        ctx.service()
            .execute(command::IssueToken {
                email: email.into(),
                purpose: token::Purpose::PasswordReset,
                ttl: Self::PASSWORD_RESET_TTL,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Redeems a password-reset token and sets the new password.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `TOKEN_INVALID` - the link is invalid or expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "resetIdentityPassword",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn reset_identity_password(
        token: api::token::Value,
        new_password: api::identity::Password,
        ctx: &Context,
    ) -> Result<api::Identity, Error> {
        ctx.service()
            .execute(command::ResetIdentityPassword {
                token: token.into(),
                new_password: secrecy::SecretBox::init_with(move || {
                    new_password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Redeems a membership-activation token and signs the invitee in.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `TOKEN_INVALID` - the link is invalid or expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "activateMembership",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn activate_membership(
        token: api::token::Value,
        ctx: &Context,
    ) -> Result<api::identity::session::CreateResult, Error> {
        let activated = ctx
            .service()
            .execute(command::ActivateMembership {
                token: token.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let output = ctx
            .service()
            .execute(command::CreateIdentitySession::ByIdentityId(
                activated.identity.id,
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            identity_id: output.identity.id.into(),
            token: output.token.clone(),
            membership: output.session.membership,
            expires_at: output.session.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Onboards a new clinic, making the caller its `ADMIN`.
    ///
    /// The subscription starts inactive until the billing collaborator
    /// confirms it.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createTenant",
            name = %name,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_tenant(
        name: api::tenant::Name,
        plan: Option<api::tenant::Plan>,
        seat_limit: Option<i32>,
        ctx: &Context,
    ) -> Result<api::tenant::TenantResult, Error> {
        use api::tenant::TenantResult as R;

        let seat_limit = seat_limit
            .map(|limit| {
                service::domain::tenant::SeatLimit::new(limit)
                    .ok_or_else(|| TenantInputError::InvalidSeatLimit.into())
                    .map_err(ctx.error())
            })
            .transpose()?;

        match ctx.authorize(Requirement::Session).await? {
            Access::Granted(grant) => {
                let output = ctx
                    .service()
                    .execute(command::CreateTenant {
                        identity_id: grant.session.identity_id,
                        name: name.into(),
                        plan: plan.map(Into::into),
                        seat_limit,
                    })
                    .await
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?;
                Ok(R::Tenant(output.tenant.into()))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Renames the active clinic.
    ///
    /// Restricted to the `ADMIN` role: insufficient callers are silently
    /// routed to the default page.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "updateTenantName",
            name = %name,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn update_tenant_name(
        name: api::tenant::Name,
        ctx: &Context,
    ) -> Result<api::tenant::TenantResult, Error> {
        use api::tenant::TenantResult as R;

        match ctx
            .authorize(Requirement::Role(membership::Role::Admin))
            .await?
        {
            Access::Granted(grant) => {
                let tenant = grant.tenant.ok_or_else(|| {
                    ctx.error()(Error::internal(
                        &"`Role` grant is missing its `Tenant`",
                    ))
                })?;
                ctx.service()
                    .execute(command::UpdateTenantName {
                        tenant_id: tenant.id,
                        name: name.into(),
                    })
                    .await
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .map(|t| R::Tenant(t.into()))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Invites an existing `Identity` into the active clinic.
    ///
    /// Restricted to the `ADMIN` role. Delivering the returned activation
    /// token is the caller's job.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `UNKNOWN_EMAIL` - no `Identity` owns the provided `IdentityEmail`;
    /// - `ALREADY_MEMBER` - the invitee already holds a `Membership`;
    /// - `SEAT_LIMIT_EXCEEDED` - the clinic has no free seats left.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "inviteMember",
            email = %email,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn invite_member(
        email: api::identity::Email,
        role: api::tenant::Role,
        ctx: &Context,
    ) -> Result<api::tenant::InviteMemberResult, Error> {
        use api::tenant::InviteMemberResult as R;

        match ctx
            .authorize(Requirement::Role(membership::Role::Admin))
            .await?
        {
            Access::Granted(grant) => {
                let tenant = grant.tenant.ok_or_else(|| {
                    ctx.error()(Error::internal(
                        &"`Role` grant is missing its `Tenant`",
                    ))
                })?;
                let output = ctx
                    .service()
                    .execute(command::InviteMember {
                        tenant_id: tenant.id,
                        email: email.into(),
                        role: role.into(),
                        ttl: Self::ACTIVATION_TTL,
                    })
                    .await
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())?;
                Ok(R::Invite(api::tenant::InviteResult {
                    membership: output.membership.into(),
                    token: output.token.into(),
                }))
            }
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Switches the active clinic of the current `Session`.
    ///
    /// Re-issues the `Session` cookie. When the caller holds no operable
    /// `Membership` there, the re-issued `Session` carries no active clinic
    /// and the client belongs on the tenant-selection page.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "switchTenant",
            otel.name = Self::SPAN_NAME,
            tenant_id = %tenant_id,
        ),
    )]
    pub async fn switch_tenant(
        tenant_id: api::tenant::Id,
        ctx: &Context,
    ) -> Result<api::identity::session::SwitchTenantResult, Error> {
        use api::identity::session::SwitchTenantResult as R;

        match ctx.authorize(Requirement::Session).await? {
            Access::Granted(grant) => ctx
                .service()
                .execute(command::SwitchTenant::Activate {
                    session: grant.session,
                    tenant: tenant_id.into(),
                })
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(|output| R::Session(output.into())),
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }

    /// Clears the active clinic of the current `Session`, routing back to
    /// tenant selection.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "clearTenant",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn clear_tenant(
        ctx: &Context,
    ) -> Result<api::identity::session::SwitchTenantResult, Error> {
        use api::identity::session::SwitchTenantResult as R;

        match ctx.authorize(Requirement::Session).await? {
            Access::Granted(grant) => ctx
                .service()
                .execute(command::SwitchTenant::Clear {
                    session: grant.session,
                })
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(|output| R::Session(output.into())),
            Access::Redirect(redirect) => Ok(R::Redirect(redirect.into())),
        }
    }
}

define_error! {
    enum TenantInputError {
        #[code = "INVALID_SEAT_LIMIT"]
        #[status = BAD_REQUEST]
        #[message = "Seat limit must be a positive number"]
        InvalidSeatLimit,
    }
}

impl AsError for command::create_identity::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "`IdentityEmail` is occupied by another \
                             `Identity`"]
                EmailOccupied,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(Error::EmailOccupied.into()),
        }
    }
}

impl AsError for command::create_identity_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = FORBIDDEN]
                #[message = "Provided credentials does not match any \
                             `Identity`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::IdentityNotExists(_) | Self::WrongCredentials => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::issue_token::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UnknownEmail(_) => Some(EmailError::Unknown.into()),
        }
    }
}

impl AsError for command::consume_token::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Expired
            | Self::IdentityNotExists(_)
            | Self::NotFound
            | Self::PurposeMismatch(_) => Some(TokenError::Invalid.into()),
        }
    }
}

impl AsError for command::reset_identity_password::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::IdentityNotExists(_)
            | Self::TokenExpired
            | Self::TokenNotFound
            | Self::TokenPurposeMismatch(_) => {
                Some(TokenError::Invalid.into())
            }
        }
    }
}

impl AsError for command::activate_membership::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::IdentityNotExists(_)
            | Self::TokenExpired
            | Self::TokenNotFound
            | Self::TokenPurposeMismatch(_) => {
                Some(TokenError::Invalid.into())
            }
        }
    }
}

impl AsError for command::create_tenant::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::IdentityNotExists(_) => None,
        }
    }
}

impl AsError for command::update_tenant_name::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::TenantNotExists(_) => None,
        }
    }
}

impl AsError for command::invite_member::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "ALREADY_MEMBER"]
                #[status = CONFLICT]
                #[message = "`Identity` is already a member of the clinic"]
                AlreadyMember,

                #[code = "SEAT_LIMIT_EXCEEDED"]
                #[status = CONFLICT]
                #[message = "The clinic has no free seats left"]
                SeatLimitExceeded,
            }
        }

        match self {
            Self::AlreadyMember => Some(Error::AlreadyMember.into()),
            Self::Db(e) => e.try_as_error(),
            Self::SeatLimitExceeded(_) => {
                Some(Error::SeatLimitExceeded.into())
            }
            Self::TenantNotExists(_) => None,
            Self::UnknownEmail(_) => Some(EmailError::Unknown.into()),
        }
    }
}

impl AsError for command::switch_tenant::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::IdentityNotExists(_) | Self::JsonWebTokenEncodeError(_) => {
                None
            }
        }
    }
}

define_error! {
    enum EmailError {
        #[code = "UNKNOWN_EMAIL"]
        #[status = NOT_FOUND]
        #[message = "No `Identity` owns the provided `IdentityEmail`"]
        Unknown,
    }
}

define_error! {
    enum TokenError {
        #[code = "TOKEN_INVALID"]
        #[status = BAD_REQUEST]
        #[message = "The link is invalid or expired"]
        Invalid,
    }
}
