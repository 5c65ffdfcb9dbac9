pub(crate) mod notifications;
pub(crate) mod permissions;
pub(crate) mod planets;
pub(crate) mod roles;

pub(crate) use notifications::*;
pub(crate) use permissions::*;
pub(crate) use planets::*;
pub(crate) use roles::*;

use std::str::FromStr;

use crate::server::errors::ApiFailure;

/// Parses a path or body identifier, mapping garbage to a 400.
pub(crate) fn parse_id<T: FromStr>(value: &str) -> Result<T, ApiFailure> {
    value.parse().map_err(|_| ApiFailure::InvalidRequest)
}
