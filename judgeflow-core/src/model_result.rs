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

//! Per-model-call outcome.
//!
//! Deliberately not a bare `Result<T, E>`: the shared bookkeeping fields
//! (model id, duration, prompt) must survive failure so the runner and
//! listeners can report on a failed call without losing context.

use crate::error::JudgeError;
use std::time::Duration;

/// A single judge vote, reused across dual-judge metrics (Answer Accuracy,
/// Response Groundedness) to report which judge produced which raw verdict.
#[derive(Debug, Clone)]
pub struct JudgeVote {
    pub judge_id: String,
    pub passed: bool,
    pub score: Option<f64>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelResult<T> {
    pub model_id: String,
    pub duration: Duration,
    pub prompt: Option<String>,
    pub outcome: std::result::Result<T, JudgeError>,
}

impl<T> ModelResult<T> {
    pub fn success(model_id: impl Into<String>, duration: Duration, prompt: Option<String>, value: T) -> Self {
        Self {
            model_id: model_id.into(),
            duration,
            prompt,
            outcome: Ok(value),
        }
    }

    pub fn failure(
        model_id: impl Into<String>,
        duration: Duration,
        prompt: Option<String>,
        error: JudgeError,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            duration,
            prompt,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&JudgeError> {
        self.outcome.as_ref().err()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ModelResult<U> {
        ModelResult {
            model_id: self.model_id,
            duration: self.duration,
            prompt: self.prompt,
            outcome: self.outcome.map(f),
        }
    }
}
