use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use folio_core::DocumentSearch;

use crate::tool::{parse_arguments, Tool, ToolContext, ToolDefinition, ToolError};

/// Passages returned per `search_documents` call unless configured otherwise.
pub const DEFAULT_PASSAGE_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
struct SearchDocumentsArgs {
    query: String,
}

/// `search_documents`: retrieval over the caller's own uploaded documents.
///
/// The owner filter always comes from [`ToolContext::identity`]; the model
/// cannot supply or override it.
pub struct SearchDocumentsTool {
    search: Arc<dyn DocumentSearch>,
    limit: usize,
}

impl SearchDocumentsTool {
    pub fn new(search: Arc<dyn DocumentSearch>) -> Self {
        Self {
            search,
            limit: DEFAULT_PASSAGE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

#[async_trait]
impl Tool for SearchDocumentsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_documents".to_string(),
            description: "Search the user's uploaded documents (books, PDFs) for relevant passages. \
                          Use this when the user asks about their documents. Returns the most \
                          relevant text passages."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question or search term to look up in the documents"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: &str, context: &ToolContext) -> Result<String, ToolError> {
        let args: SearchDocumentsArgs = parse_arguments(arguments)?;
        let passages = self
            .search
            .search_documents(&args.query, &context.identity, self.limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        debug!(count = passages.len(), "search_documents returned passages");

        if passages.is_empty() {
            return Ok("No matching passages were found in the user's documents.".to_string());
        }
        serde_json::to_string(&passages).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::Result;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, String, usize)>>,
        passages: Vec<String>,
    }

    #[async_trait]
    impl DocumentSearch for Recording {
        async fn search_documents(&self, query: &str, owner: &str, limit: usize) -> Result<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), owner.to_string(), limit));
            Ok(self.passages.clone())
        }
    }

    #[tokio::test]
    async fn test_owner_comes_from_context() {
        let search = Arc::new(Recording {
            passages: vec!["Call me Ishmael.".to_string()],
            ..Default::default()
        });
        let tool = SearchDocumentsTool::new(search.clone());

        // An owner smuggled into the arguments is ignored.
        let out = tool
            .execute(r#"{"query": "narrator", "owner": "mallory"}"#, &ToolContext::new("alice"))
            .await
            .unwrap();

        assert_eq!(out, r#"["Call me Ishmael."]"#);
        let calls = search.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("narrator".to_string(), "alice".to_string(), 20)]);
    }

    #[tokio::test]
    async fn test_limit_and_empty_result() {
        let search = Arc::new(Recording::default());
        let tool = SearchDocumentsTool::new(search.clone()).with_limit(5);

        let out = tool
            .execute(r#"{"query": "anything"}"#, &ToolContext::new("bob"))
            .await
            .unwrap();

        assert!(out.starts_with("No matching passages"));
        assert_eq!(search.calls.lock().unwrap()[0].2, 5);
    }
}
