//! Aggregated configuration for every component.

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::auth::AuthLookupOptions;
use crate::disposable::DisposableOptions;
use crate::dns::ResolverOptions;
use crate::greylist::RetryPolicy;
use crate::reputation::ReputationOptions;
use crate::smtp::ProbeOptions;
use crate::verify::VerifyOptions;

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub resolver: ResolverOptions,
    pub probe: ProbeOptions,
    pub auth: AuthLookupOptions,
    pub reputation: ReputationOptions,
    pub disposable: DisposableOptions,
    pub retry: RetryPolicy,
    pub verify: VerifyOptions,
}
