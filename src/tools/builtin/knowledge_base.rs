//! Knowledge base lookup backed by a Supabase vector store.
//!
//! The query is embedded remotely, then matched through a PostgREST RPC
//! function (`match_documents` by default) that returns the closest passages.

use crate::agent::factory::resolve_api_key;
use crate::config::AppConfig;
use crate::embeddings::EmbeddingsClient;
use crate::tools::{Tool, ToolResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const HARD_MAX_MATCHES: usize = 10;

#[derive(Debug, Deserialize)]
struct KnowledgeBaseArgs {
    query: String,
    match_count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
    filter: Value,
}

/// One passage returned by the match function
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KnowledgeMatch {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub similarity: Option<f32>,
}

/// Searches the organisation's document store for passages relevant to a query
pub struct KnowledgeBaseTool {
    client: Client,
    embeddings: EmbeddingsClient,
    rpc_url: String,
    api_key: String,
    default_matches: usize,
}

impl KnowledgeBaseTool {
    pub fn new(
        base_url: &str,
        match_function: &str,
        api_key: impl Into<String>,
        embeddings: EmbeddingsClient,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building knowledge base HTTP client")?;
        Ok(Self {
            client,
            embeddings,
            rpc_url: format!(
                "{}/rest/v1/rpc/{}",
                base_url.trim_end_matches('/'),
                match_function
            ),
            api_key: api_key.into(),
            default_matches: 4,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let knowledge = &config.knowledge;
        let base_url = knowledge
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("knowledge.url is not set (or SUPABASE_URL)"))?;
        let api_key = resolve_api_key(&knowledge.api_key_source)
            .context("resolving knowledge base API key")?;
        let embeddings_key_source = knowledge
            .embeddings_api_key_source
            .as_deref()
            .unwrap_or("env:OPENAI_API_KEY");
        let embeddings_key = resolve_api_key(embeddings_key_source)
            .context("resolving embeddings API key")?;
        let embeddings =
            EmbeddingsClient::with_api_key(knowledge.embeddings_model.clone(), embeddings_key);

        Ok(Self::new(
            base_url,
            &knowledge.match_function,
            api_key,
            embeddings,
            Duration::from_secs(knowledge.timeout_secs),
        )?
        .with_default_matches(knowledge.match_count))
    }

    pub fn with_default_matches(mut self, count: usize) -> Self {
        self.default_matches = count.clamp(1, HARD_MAX_MATCHES);
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn search(&self, query: &str, match_count: usize) -> Result<Vec<KnowledgeMatch>> {
        let embedding = self
            .embeddings
            .embed(query)
            .await
            .context("embedding knowledge base query")?;

        let body = MatchRequest {
            query_embedding: &embedding,
            match_count,
            filter: serde_json::json!({}),
        };

        self.client
            .post(&self.rpc_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Knowledge base request failed")?
            .error_for_status()
            .context("Knowledge base returned error status")?
            .json::<Vec<KnowledgeMatch>>()
            .await
            .context("Failed to parse knowledge base response")
    }
}

/// Render matches as numbered passages the model can quote from
pub fn format_matches(query: &str, matches: &[KnowledgeMatch]) -> String {
    if matches.is_empty() {
        return format!(
            "No se encontró información en la base de conocimiento para: \"{}\"",
            query
        );
    }

    let mut out = format!("Resultados de la base de conocimiento para \"{}\":\n", query);
    for (idx, hit) in matches.iter().enumerate() {
        out.push_str(&format!("\n[{}]", idx + 1));
        if let Some(similarity) = hit.similarity {
            out.push_str(&format!(" (similitud {:.2})", similarity));
        }
        if let Some(source) = hit
            .metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(Value::as_str)
        {
            out.push_str(&format!(" fuente: {}", source));
        }
        out.push('\n');
        out.push_str(hit.content.trim());
        out.push('\n');
    }
    out
}

#[async_trait]
impl Tool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Busca en la base de conocimiento de DATAPATH: programas, cursos, precios, docentes y políticas. Úsala para cualquier pregunta sobre la organización."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Pregunta o palabras clave a buscar"
                },
                "match_count": {
                    "type": "integer",
                    "description": "Número de fragmentos a recuperar (máx. 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let args: KnowledgeBaseArgs = serde_json::from_value(args)
            .context("Failed to parse search_knowledge_base arguments")?;

        let query = args.query.trim();
        if query.is_empty() {
            return Err(anyhow!("search_knowledge_base query cannot be empty"));
        }

        let match_count = args
            .match_count
            .unwrap_or(self.default_matches)
            .clamp(1, HARD_MAX_MATCHES);

        let matches = self.search(query, match_count).await?;
        Ok(ToolResult::success(format_matches(query, &matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingsService;
    use serde_json::json;
    use std::sync::Arc;

    struct FixedEmbeddings;

    #[async_trait]
    impl EmbeddingsService for FixedEmbeddings {
        async fn create_embeddings(
            &self,
            _model: &str,
            inputs: Vec<String>,
        ) -> Result<Vec<Vec<f32>>> {
            Ok(inputs.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    fn tool(base_url: &str) -> KnowledgeBaseTool {
        let embeddings = EmbeddingsClient::with_service("test", Arc::new(FixedEmbeddings));
        KnowledgeBaseTool::new(
            base_url,
            "match_documents",
            "secret",
            embeddings,
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[test]
    fn builds_rpc_url_without_double_slash() {
        let tool = tool("https://example.supabase.co/");
        assert_eq!(
            tool.rpc_url(),
            "https://example.supabase.co/rest/v1/rpc/match_documents"
        );
    }

    #[test]
    fn formats_matches_with_similarity_and_source() {
        let matches = vec![
            KnowledgeMatch {
                content: "Programa de IA: 6 meses".to_string(),
                metadata: Some(json!({"source": "programas.pdf"})),
                similarity: Some(0.91),
            },
            KnowledgeMatch {
                content: "Precio: 1200 USD".to_string(),
                metadata: None,
                similarity: None,
            },
        ];
        let text = format_matches("programa de IA", &matches);
        assert!(text.contains("[1] (similitud 0.91) fuente: programas.pdf"));
        assert!(text.contains("Programa de IA: 6 meses"));
        assert!(text.contains("[2]\nPrecio: 1200 USD"));
    }

    #[test]
    fn formats_empty_result_set() {
        let text = format_matches("robótica", &[]);
        assert!(text.contains("No se encontró información"));
        assert!(text.contains("robótica"));
    }

    #[test]
    fn match_rows_tolerate_missing_fields() {
        let rows: Vec<KnowledgeMatch> =
            serde_json::from_value(json!([{ "content": "texto", "id": 3 }])).unwrap();
        assert_eq!(rows[0].content, "texto");
        assert!(rows[0].similarity.is_none());
    }

    #[tokio::test]
    async fn rejects_empty_query() {
        let tool = tool("http://127.0.0.1:9");
        let result = tool.execute(json!({ "query": "  " })).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let tool = tool("http://127.0.0.1:9");
        let result = tool.execute(json!({ "query": "cursos" })).await;
        assert!(result.is_err());
    }

    #[test]
    fn from_config_requires_url() {
        let mut config = AppConfig::default();
        config.knowledge.url = None;
        assert!(KnowledgeBaseTool::from_config(&config).is_err());
    }
}
