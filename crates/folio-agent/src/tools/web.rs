use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use folio_core::WebSearch;

use crate::tool::{parse_arguments, Tool, ToolContext, ToolDefinition, ToolError};

#[derive(Debug, Deserialize)]
struct SearchWebArgs {
    query: String,
}

/// `search_web`: general internet search.
pub struct SearchWebTool {
    search: Arc<dyn WebSearch>,
}

impl SearchWebTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_web".to_string(),
            description: "Search the internet to find current information. Use this when the user \
                          asks about recent events, general knowledge, or anything not covered by \
                          their uploaded documents."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query or question to look up on the internet"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, _context: &ToolContext) -> Result<String, ToolError> {
        let args: SearchWebArgs = parse_arguments(arguments)?;
        self.search
            .search_web(&args.query)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
