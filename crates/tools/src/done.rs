//! The terminal action: hands the final answer back to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use webcell_core::Result;

use crate::{Context, Tool, ToolSchema};

#[derive(Debug, Clone, Deserialize)]
pub struct DoneTool {
    pub answer: String,
}

#[async_trait]
impl Tool for DoneTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Done Tool",
            description: "To indicate that the task is completed and give the final answer",
            parameters: json!({
                "type": "object",
                "properties": {
                    "answer": {"type": "string", "description": "the final answer for the user in markdown"}
                },
                "required": ["answer"]
            }),
        }
    }

    async fn execute(self, _ctx: &mut Context) -> Result<String> {
        Ok(self.answer)
    }
}
