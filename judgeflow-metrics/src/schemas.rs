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

//! Strict JSON shapes every judge response is parsed into. One struct per
//! wire schema family; metrics deserialize through these rather than
//! indexing a raw `serde_json::Value`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementExtraction {
    pub statements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementVerdict {
    pub statement: String,
    pub verdict: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictList {
    pub verdicts: Vec<StatementVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryVerdict {
    pub verdict: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolVerdict {
    pub verdict: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreVerdict {
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevancyQuestions {
    pub questions: Vec<String>,
    #[serde(default)]
    pub noncommittal: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityExtraction {
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NliVerdict {
    Supported,
    Refuted,
    NotInferrable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliClassification {
    pub verdict: NliVerdict,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliClaimVerdict {
    #[serde(default)]
    pub claim: String,
    pub verdict: NliVerdict,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliVerdictList {
    pub verdicts: Vec<NliClaimVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvidiaJudgment {
    pub judgment: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextVerdict {
    #[serde(default)]
    pub context: String,
    pub verdict: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextVerdictList {
    pub verdicts: Vec<ContextVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnVerdict {
    #[serde(default)]
    pub turn_index: usize,
    pub in_scope: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnVerdictList {
    pub verdicts: Vec<TurnVerdict>,
}
