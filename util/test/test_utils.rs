/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::OnceLock;

use logger::initialise_global_logging;

static LOGGING_INITIALISED: OnceLock<()> = OnceLock::new();

pub fn init_logging() {
    LOGGING_INITIALISED.get_or_init(|| {
        // another test binary harness may already own the global subscriber
        let _ = initialise_global_logging();
    });
}

pub fn assert_approx_eq(expected: f64, actual: f64, epsilon: f64) {
    assert!((expected - actual).abs() <= epsilon, "expected {expected} (+/- {epsilon}), got {actual}");
}
