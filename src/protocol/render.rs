//! Presentation filter: the text a human sees for one assistant turn.

use super::ParsedReply;
use serde::{Deserialize, Serialize};

/// Heading that separates the assistant's prose from the execution record.
pub const EXECUTION_RECORD_HEADER: &str = "📝 **Execution record:**";

/// Output of one processed turn, consumed by chat history and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTurn {
    /// Reply with all command markup removed. This is what chat history stores.
    pub clean_text: String,
    /// Warnings and execution results in order.
    pub execution_results: Vec<String>,
}

impl RenderedTurn {
    /// Clean text plus the execution record when there is one.
    pub fn display_message(&self) -> String {
        if self.execution_results.is_empty() {
            return self.clean_text.clone();
        }
        let record = self.execution_results.join("\n");
        if self.clean_text.is_empty() {
            format!("{}\n{}", EXECUTION_RECORD_HEADER, record)
        } else {
            format!("{}\n\n{}\n{}", self.clean_text, EXECUTION_RECORD_HEADER, record)
        }
    }
}

/// Build the turn from the parsed original reply and the finished batch's result lines.
pub fn render(parsed: &ParsedReply, execution_results: Vec<String>) -> RenderedTurn {
    RenderedTurn {
        clean_text: parsed.clean_text.clone(),
        execution_results,
    }
}
