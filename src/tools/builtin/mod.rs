pub mod knowledge_base;
pub mod web_search;

pub use knowledge_base::KnowledgeBaseTool;
pub use web_search::WebSearchTool;
