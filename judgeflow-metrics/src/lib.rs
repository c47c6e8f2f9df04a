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

//! Judgeflow Metrics
//!
//! The RAG/agentic metric catalog: each module is a named pipeline built
//! on top of `judgeflow_core`'s executor, runner and listener bus.

pub mod agent_goal_accuracy;
pub mod answer_correctness;
pub mod common;
pub mod config;
pub mod context_precision;
pub mod context_recall;
pub mod extraction;
pub mod factual_correctness;
pub mod faithfulness;
pub mod noise_sensitivity;
pub mod nvidia_metrics;
pub mod response_relevancy;
pub mod rubrics;
pub mod schemas;
pub mod semantic_similarity;
pub mod text_overlap;
pub mod tool_call_accuracy;
pub mod topic_adherence;
