//! [`Token`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Display, FromStr};
use uuid::Uuid;

use crate::domain::identity;
#[cfg(doc)]
use crate::domain::Identity;

/// Single-use, purpose-scoped, time-limited credential.
///
/// Bound to the [`Email`] of an [`Identity`] and redeemable exactly once,
/// before [`Token::expires_at`].
///
/// [`Email`]: identity::Email
#[derive(Clone, Debug)]
pub struct Token {
    /// Opaque [`Value`] of this [`Token`].
    pub value: Value,

    /// [`Email`] this [`Token`] is bound to.
    ///
    /// [`Email`]: identity::Email
    pub email: identity::Email,

    /// [`Purpose`] this [`Token`] may be redeemed for.
    pub purpose: Purpose,

    /// [`DateTime`] when this [`Token`] was issued.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Token`] expires.
    pub expires_at: ExpirationDateTime,
}

impl Token {
    /// Indicates whether this [`Token`] is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= DateTime::now().coerce()
    }
}

define_kind! {
    #[doc = "Purpose a `Token` may be redeemed for."]
    enum Purpose {
        #[doc = "Resetting a forgotten password."]
        PasswordReset = 1,

        #[doc = "Passwordless login via an emailed link."]
        MagicLink = 2,

        #[doc = "Activating an invited `Membership`."]
        Activation = 3,
    }
}

/// Opaque value of a [`Token`].
///
/// 256 bits of getrandom-backed entropy, hex-encoded.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(
    feature = "postgres",
    derive(postgres_types::FromSql, postgres_types::ToSql),
    postgres(transparent)
)]
pub struct Value(String);

impl Value {
    /// Length of a [`Value`] string representation.
    const LENGTH: usize = 64;

    /// Generates a new random [`Value`].
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple(),
        ))
    }

    /// Creates a new [`Value`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `value` must be a valid [`Value`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for Value {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        (s.len() == Self::LENGTH && s.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| Self(s.to_owned()))
            .ok_or("invalid `Value`")
    }
}

/// [`DateTime`] when a [`Token`] was issued.
pub type CreationDateTime = DateTimeOf<(Token, unit::Creation)>;

/// [`DateTime`] when a [`Token`] expires.
pub type ExpirationDateTime = DateTimeOf<(Token, unit::Expiration)>;
