//! [`Context`]-related definitions.

use std::{
    future,
    sync::atomic::{self, AtomicU16},
};

use axum::{async_trait, extract::FromRequestParts};
use axum_extra::extract::cookie::CookieJar;
use common::DateTime;
use juniper::{
    http::{GraphQLBatchResponse, GraphQLResponse},
    IntoFieldError as _,
};
use service::{
    command::{self, Command as _},
    domain::identity::session,
};
use tokio::sync::OnceCell;

#[cfg(doc)]
use crate::api::Identity;
use crate::{api, define_error, AsError, Error, JuniperResponse, Service};

/// Application context.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Error status code.
    error_status_code: AtomicU16,

    /// Parts of the HTTP request.
    parts: http::request::Parts,

    /// Current [`Session`].
    current_session: OnceCell<Session>,

    /// Last authentication [`Error`].
    auth_error: OnceCell<Error>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the error status code of this [`Context`].
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn error_status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(
            self.error_status_code.load(atomic::Ordering::Relaxed),
        )
        .expect("invalid status code")
    }

    /// Sets the error status code for this [`Context`].
    ///
    /// Provided [`http::StatusCode`] will be applied to the response.
    pub fn set_error_status_code(&self, status_code: http::StatusCode) {
        self.error_status_code
            .store(status_code.as_u16(), atomic::Ordering::Relaxed);
    }

    /// Helper method calling [`Context::set_error_status_code()`] inside
    /// [`Result::map_err()`] closure.
    pub fn error(&self) -> impl FnOnce(Error) -> Error + '_ {
        move |err| {
            self.set_error_status_code(err.status_code);
            err
        }
    }

    /// Returns the raw value of the [`Session`] cookie, if the request
    /// carries one.
    #[must_use]
    pub fn session_cookie(&self) -> Option<session::Token> {
        CookieJar::from_headers(&self.parts.headers)
            .get(Session::COOKIE)
            .map(|cookie| {
                #[expect(
                    unsafe_code,
                    reason = "opaqueness is validated on decoding"
                )]
                unsafe {
                    session::Token::new_unchecked(cookie.value().to_owned())
                }
            })
    }

    /// Runs the access gate with the provided [`command::Requirement`].
    ///
    /// An insufficiency is returned as [`command::Access::Redirect`], never
    /// as an [`Error`]: only infrastructure failures error here.
    ///
    /// # Errors
    ///
    /// Errors if the gate could not consult persistent state.
    pub async fn authorize(
        &self,
        requirement: command::Requirement,
    ) -> Result<command::Access, Error> {
        self.service
            .execute(command::AuthorizeAccess {
                token: self.session_cookie(),
                requirement,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(self.error())
    }

    /// Sets the current [`Session`] for this [`Context`].
    pub async fn set_current_session(&self, session: Session) {
        _ = self
            .current_session
            .get_or_init(|| future::ready(session))
            .await;
    }

    /// Tries to get the current [`Session`] for this [`Context`].
    ///
    /// # Errors
    ///
    /// Errors if the provided authentication cookie is invalid.
    pub async fn try_current_session(&self) -> Result<Option<Session>, Error> {
        self.current_session().await.map(Some).or_else(|e| {
            if e.code == Error::from(AuthError::AuthenticationRequired).code {
                Ok(None)
            } else {
                Err(e)
            }
        })
    }

    /// Returns the current [`Session`] for this [`Context`].
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the current HTTP request carries no `session` cookie;
    /// - the carried cookie does not decode.
    pub async fn current_session(&self) -> Result<Session, Error> {
        self.current_session
            .get_or_try_init(|| async {
                match self
                    .auth_error
                    .get_or_try_init(|| async {
                        match self.do_authentication().await {
                            Ok(u) => Err(u),
                            Err(e) => Ok(e),
                        }
                    })
                    .await
                {
                    Ok(e) => Err(e),
                    Err(u) => Ok(u),
                }
            })
            .await
            .cloned()
            .map_err(Clone::clone)
    }

    /// Performs the [`Session`] authentication.
    ///
    /// # Errors
    ///
    /// Errors if the provided authentication cookie is invalid.
    async fn do_authentication(&self) -> Result<Session, Error> {
        let Some(token) = self.session_cookie() else {
            return Err(self.error()(AuthError::AuthenticationRequired.into()));
        };

        self.service
            .execute(command::AuthorizeIdentitySession {
                token: token.clone(),
            })
            .await
            .map(|s| Session {
                identity_id: s.identity_id.into(),
                token,
                membership: s.membership,
                expires_at: s.expires_at.coerce(),
            })
            .map_err(AsError::into_error)
            .map_err(self.error())
    }
}

impl juniper::Context for Context {}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = JuniperResponse;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service =
            parts.extensions.get::<Service>().cloned().ok_or_else(|| {
                JuniperResponse {
                    status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
                    response: GraphQLBatchResponse::Single(
                        GraphQLResponse::error(
                            Error::internal(&"missing `Service` extension")
                                .into_field_error(),
                        ),
                    ),
                }
            })?;

        Ok(Self {
            service,
            error_status_code: AtomicU16::new(
                http::StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            ),
            parts: parts.clone(),
            current_session: OnceCell::new(),
            auth_error: OnceCell::new(),
        })
    }
}

/// Authenticated session of the current HTTP request.
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of the [`Identity`] associated with this [`Session`].
    pub identity_id: api::identity::Id,

    /// Raw cookie token this [`Session`] was resolved from.
    pub token: session::Token,

    /// Active membership claims embedded into this [`Session`].
    ///
    /// Proof of selection only: authorization always re-checks live records
    /// through the access gate.
    pub membership: Option<session::Membership>,

    /// [`DateTime`] when this [`Session`] expires.
    pub expires_at: DateTime,
}

impl Session {
    /// Name of the cookie carrying a [`Session`] token.
    pub const COOKIE: &'static str = "session";
}

impl AsError for command::authorize_identity_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::JsonWebTokenDecodeError(_) => {
                Some(AuthError::AuthenticationRequired.into())
            }
        }
    }
}

impl AsError for command::authorize_access::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHENTICATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authentication required"]
        AuthenticationRequired,
    }
}
