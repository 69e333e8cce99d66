//! [`Command`] gating access to protected operations.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        identity::{self, session, Session},
        membership, tenant, Membership, Tenant,
    },
    infra::{database, Database},
    Service,
};

use super::{AuthorizeIdentitySession, Command};

/// [`Command`] gating access to a protected operation.
///
/// The single place where authorization policy lives: callers supply a
/// [`Requirement`], never raw roles. Every insufficiency is answered with an
/// [`Access::Redirect`] value rather than an error, so nothing here ever
/// reaches a top-level error boundary.
#[derive(Clone, Debug)]
pub struct AuthorizeAccess {
    /// Raw [`Session`] cookie [`session::Token`], if the request carried
    /// one.
    pub token: Option<session::Token>,

    /// [`Requirement`] the operation demands.
    pub requirement: Requirement,
}

/// Capability a protected operation requires.
///
/// Each level implies all the previous ones.
#[derive(Clone, Copy, Debug)]
pub enum Requirement {
    /// A valid [`Session`]: the caller is authenticated.
    Session,

    /// An operable [`Membership`] in an operable [`Tenant`].
    Membership,

    /// A [`Membership`] whose [`membership::Role`] satisfies the required
    /// one.
    Role(membership::Role),

    /// A [`Tenant`] with an active subscription.
    ///
    /// [`membership::Role::Admin`] passes regardless, to reach billing
    /// management.
    ActiveSubscription,
}

/// Outcome of an [`AuthorizeAccess`] [`Command`].
#[derive(Clone, Debug)]
pub enum Access {
    /// Operation may proceed.
    Granted(Grant),

    /// Operation must not proceed: the caller is routed to a remediation
    /// page instead.
    Redirect(Redirect),
}

/// Proof of a granted [`Requirement`].
#[derive(Clone, Debug)]
pub struct Grant {
    /// Resolved [`Session`] of the caller.
    pub session: Session,

    /// Freshly loaded active [`Membership`], when the [`Requirement`]
    /// demanded one.
    pub membership: Option<Membership>,

    /// Freshly loaded active [`Tenant`], when the [`Requirement`] demanded
    /// one.
    pub tenant: Option<Tenant>,
}

/// Remediation page an insufficient caller is routed to.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Redirect {
    /// Authentication is missing or invalid.
    #[display("/sign-in")]
    SignIn,

    /// No operable active [`Membership`]: back to tenant selection.
    #[display("/welcome")]
    Welcome,

    /// [`membership::Role`] is insufficient: silently to the safe default
    /// page.
    #[display("/home")]
    Home,

    /// Subscription is inactive: to the resume-subscription flow.
    #[display("/subscription/resume")]
    SubscriptionResume,
}

impl Redirect {
    /// Returns the path of the page this [`Redirect`] routes to.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::SignIn => "/sign-in",
            Self::Welcome => "/welcome",
            Self::Home => "/home",
            Self::SubscriptionResume => "/subscription/resume",
        }
    }
}

impl<Db> Command<AuthorizeAccess> for Service<Db>
where
    Db: Database<
            Select<By<Option<Membership>, (identity::Id, tenant::Id)>>,
            Ok = Option<Membership>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Tenant>, tenant::Id>>,
            Ok = Option<Tenant>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Access;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeAccess,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeAccess { token, requirement } = cmd;

        let Some(token) = token else {
            return Ok(Access::Redirect(Redirect::SignIn));
        };
        // Tampered, malformed and expired cookies are all just "no session".
        let Ok(session) =
            self.execute(AuthorizeIdentitySession { token }).await
        else {
            return Ok(Access::Redirect(Redirect::SignIn));
        };

        if matches!(requirement, Requirement::Session) {
            return Ok(Access::Granted(Grant {
                session,
                membership: None,
                tenant: None,
            }));
        }

        // The embedded claims only select which `Membership` to check: the
        // authorization itself always runs against live records.
        let Some(active) = session.membership else {
            return Ok(Access::Redirect(Redirect::Welcome));
        };
        let Some(membership) = self
            .database()
            .execute(Select(By::new((session.identity_id, active.tenant_id))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(Membership::is_operable)
        else {
            return Ok(Access::Redirect(Redirect::Welcome));
        };
        let Some(tenant) = self
            .database()
            .execute(Select(By::new(active.tenant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(Tenant::is_operable)
        else {
            return Ok(Access::Redirect(Redirect::Welcome));
        };

        Ok(match requirement {
            Requirement::Session | Requirement::Membership => {
                Access::Granted(Grant {
                    session,
                    membership: Some(membership),
                    tenant: Some(tenant),
                })
            }
            Requirement::Role(required) => {
                if membership.role.satisfies(required) {
                    Access::Granted(Grant {
                        session,
                        membership: Some(membership),
                        tenant: Some(tenant),
                    })
                } else {
                    Access::Redirect(Redirect::Home)
                }
            }
            Requirement::ActiveSubscription => {
                if tenant.active_subscription
                    || matches!(membership.role, membership::Role::Admin)
                {
                    Access::Granted(Grant {
                        session,
                        membership: Some(membership),
                        tenant: Some(tenant),
                    })
                } else {
                    Access::Redirect(Redirect::SubscriptionResume)
                }
            }
        })
    }
}

/// Error of [`AuthorizeAccess`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{Command as _, CreateIdentitySession, SwitchTenant},
        domain::{identity::session, membership::Role},
        testing,
    };

    use super::{Access, AuthorizeAccess, Redirect, Requirement};

    /// Issues a [`session::Token`] with the active `Membership` of the
    /// provided `tenant` embedded.
    async fn signed_in(
        service: &testing::MemService,
        mem: &testing::Mem,
        role: Role,
        active_subscription: bool,
    ) -> (session::Token, crate::domain::Membership) {
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");
        let tenant = mem.given_tenant("Bright Smiles", active_subscription);
        let membership = mem.given_membership(&identity, &tenant, role);

        let output = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap();
        let output = service
            .execute(SwitchTenant::Activate {
                session: output.session,
                tenant: tenant.id,
            })
            .await
            .unwrap();

        (output.token, membership)
    }

    fn granted(access: &Access) -> bool {
        matches!(access, Access::Granted(_))
    }

    fn redirected(access: &Access, to: Redirect) -> bool {
        matches!(access, Access::Redirect(r) if *r == to)
    }

    #[tokio::test]
    async fn missing_cookie_redirects_to_sign_in() {
        let (service, _) = testing::service();

        let access = service
            .execute(AuthorizeAccess {
                token: None,
                requirement: Requirement::Session,
            })
            .await
            .unwrap();

        assert!(redirected(&access, Redirect::SignIn));
    }

    #[tokio::test]
    async fn tampered_cookie_redirects_to_sign_in() {
        let (service, mem) = testing::service();
        let (token, _) = signed_in(&service, &mem, Role::User, true).await;

        // Flip one byte of the claims part.
        let raw = token.to_string();
        let claims_start = raw.find('.').unwrap() + 1;
        let mut bytes = raw.into_bytes();
        bytes[claims_start] =
            if bytes[claims_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let access = service
            .execute(AuthorizeAccess {
                token: Some(tampered.parse().unwrap()),
                requirement: Requirement::Session,
            })
            .await
            .unwrap();

        assert!(redirected(&access, Redirect::SignIn));
    }

    #[tokio::test]
    async fn session_without_membership_redirects_to_welcome() {
        let (service, mem) = testing::service();
        let identity = mem.given_identity("amelia@clinic.example", "s3cret");

        let output = service
            .execute(CreateIdentitySession::ByIdentityId(identity.id))
            .await
            .unwrap();

        let access = service
            .execute(AuthorizeAccess {
                token: Some(output.token),
                requirement: Requirement::Membership,
            })
            .await
            .unwrap();

        assert!(redirected(&access, Redirect::Welcome));
    }

    #[tokio::test]
    async fn banned_membership_redirects_to_welcome() {
        let (service, mem) = testing::service();
        let (token, membership) =
            signed_in(&service, &mem, Role::User, true).await;
        mem.ban_membership(&membership);

        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::Membership,
            })
            .await
            .unwrap();

        // The `Session` still decodes, yet the live ban wins.
        assert!(redirected(&access, Redirect::Welcome));
    }

    #[tokio::test]
    async fn insufficient_role_redirects_home() {
        let (service, mem) = testing::service();
        let (token, _) = signed_in(&service, &mem, Role::User, true).await;

        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::Role(Role::Admin),
            })
            .await
            .unwrap();

        assert!(redirected(&access, Redirect::Home));
    }

    #[tokio::test]
    async fn sufficient_role_is_granted() {
        let (service, mem) = testing::service();
        let (token, _) = signed_in(&service, &mem, Role::Admin, true).await;

        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::Role(Role::Admin),
            })
            .await
            .unwrap();

        assert!(granted(&access));
    }

    #[tokio::test]
    async fn inactive_subscription_redirects_user_but_not_admin() {
        let (service, mem) = testing::service();

        let (token, _) = signed_in(&service, &mem, Role::User, false).await;
        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::ActiveSubscription,
            })
            .await
            .unwrap();
        assert!(redirected(&access, Redirect::SubscriptionResume));

        let (service, mem) = testing::service();
        let (token, _) = signed_in(&service, &mem, Role::Admin, false).await;
        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::ActiveSubscription,
            })
            .await
            .unwrap();
        assert!(granted(&access));
    }

    #[tokio::test]
    async fn active_subscription_is_granted_to_user() {
        let (service, mem) = testing::service();
        let (token, _) = signed_in(&service, &mem, Role::User, true).await;

        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::ActiveSubscription,
            })
            .await
            .unwrap();

        assert!(granted(&access));
    }

    #[tokio::test]
    async fn subscription_state_is_read_fresh() {
        let (service, mem) = testing::service();
        let (token, membership) =
            signed_in(&service, &mem, Role::User, true).await;

        // Deactivate after the `Session` was issued: the gate must notice.
        mem.set_subscription(membership.tenant_id, false);

        let access = service
            .execute(AuthorizeAccess {
                token: Some(token),
                requirement: Requirement::ActiveSubscription,
            })
            .await
            .unwrap();

        assert!(redirected(&access, Redirect::SubscriptionResume));
    }
}
