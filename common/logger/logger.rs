/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub use tracing::{debug, error, info, trace};
use tracing::subscriber::{DefaultGuard, SetGlobalDefaultError};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the planner's subscriber for the current thread only, until the guard is dropped.
pub fn initialise_logging() -> DefaultGuard {
    let subscriber = tracing_subscriber::registry().with(env_filter()).with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_default(subscriber)
}

pub fn initialise_global_logging() -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::registry().with(env_filter()).with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)
}
