//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity deletion.
#[derive(Clone, Copy, Debug)]
pub struct Deletion;

/// Marker type describing an entity activation.
#[derive(Clone, Copy, Debug)]
pub struct Activation;

/// Marker type describing an entity ban.
#[derive(Clone, Copy, Debug)]
pub struct Ban;

/// Marker type describing an entity being disabled.
#[derive(Clone, Copy, Debug)]
pub struct Disabling;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;
