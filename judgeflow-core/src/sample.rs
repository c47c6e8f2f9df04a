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

//! Immutable input to a single metric evaluation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One turn of a conversation, used by trajectory-aware metrics
/// (Agent Goal Accuracy, Topic Adherence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// A tool invocation, actual or expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: HashMap<String, serde_json::Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Sample {
    pub user_input: Option<String>,
    pub response: String,
    pub reference: Option<String>,
    #[serde(default)]
    pub retrieved_contexts: Vec<String>,
    /// Contexts known to be irrelevant, for Noise Sensitivity. Disjoint from
    /// `retrieved_contexts`.
    #[serde(default)]
    pub noisy_contexts: Vec<String>,
    pub actual_tool_calls: Option<Vec<ToolCall>>,
    pub reference_tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

impl Sample {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Default::default()
        }
    }

    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_retrieved_contexts(mut self, contexts: Vec<String>) -> Self {
        self.retrieved_contexts = contexts;
        self
    }

    pub fn with_tool_calls(mut self, actual: Vec<ToolCall>, reference: Vec<ToolCall>) -> Self {
        self.actual_tool_calls = Some(actual);
        self.reference_tool_calls = Some(reference);
        self
    }
}
