//! The capabilities offered to the model.

mod documents;
mod web;

pub use documents::{SearchDocumentsTool, DEFAULT_PASSAGE_LIMIT};
pub use web::SearchWebTool;
