// Copyright 2025 Judgeflow Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error taxonomy for the execution engine.
//!
//! Per-model failures (rate limit, transport, parse) are recovered locally by
//! the runner as model exclusions and never escape as `Err`. Only
//! `Configuration`/`Validation` errors detected before the first listener
//! event fires are allowed to propagate to the caller.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The cause of a single model call's failure. Carried inside `ModelResult`
/// rather than thrown, so the runner can turn it into an exclusion.
#[derive(Debug, Error, Clone)]
pub enum JudgeError {
    #[error("rate limited: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to parse judge response: {0}")]
    Parse(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error, Clone)]
pub enum RateLimitError {
    #[error("no permit available within {waited:?} (strategy: fail-fast)")]
    FailFast { waited: Duration },

    #[error("timed out waiting {timeout:?} for a rate-limit permit")]
    TimedOut { timeout: Duration },

    #[error("skipped due to rate limiting")]
    Skipped,
}
