/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

pub mod answer_count_estimator;
pub mod conjunction_graph;
pub mod cost_estimator;
pub mod error;
pub mod planner;
pub mod session;

pub use error::PlannerError;
