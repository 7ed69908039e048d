use crate::config::WebSearchConfig;
use crate::tools::{Tool, ToolResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const HARD_MAX_RESULTS: usize = 20;

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    max_results: Option<usize>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DuckDuckGoResponse {
    #[serde(default)]
    abstract_text: Option<String>,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: Option<String>,
    results: Option<Vec<DdgResult>>,
    related_topics: Option<Vec<DdgTopic>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DdgResult {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DdgTopic {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    topics: Option<Vec<DdgTopic>>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
struct WebSearchResultEntry {
    title: String,
    url: String,
    snippet: String,
}

#[derive(Debug, Serialize)]
struct WebSearchResponse {
    query: String,
    results: Vec<WebSearchResultEntry>,
}

/// Tool that performs lightweight web searches using the DuckDuckGo API
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    default_results: usize,
}

impl WebSearchTool {
    pub fn from_config(config: &WebSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building web search HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            default_results: config.max_results.clamp(1, HARD_MAX_RESULTS),
        })
    }

    fn collect_topics(topics: &[DdgTopic], results: &mut Vec<WebSearchResultEntry>) {
        for topic in topics {
            if let (Some(text), Some(url)) = (&topic.text, &topic.first_url) {
                results.push(WebSearchResultEntry {
                    title: text.clone(),
                    snippet: text.clone(),
                    url: url.clone(),
                });
            }
            if let Some(children) = &topic.topics {
                Self::collect_topics(children, results);
            }
        }
    }

    fn flatten(response: DuckDuckGoResponse, max_results: usize) -> Vec<WebSearchResultEntry> {
        let mut results = Vec::new();

        if let (Some(text), Some(url)) = (response.abstract_text, response.abstract_url) {
            if !text.trim().is_empty() {
                results.push(WebSearchResultEntry {
                    title: text.clone(),
                    snippet: text,
                    url,
                });
            }
        }

        if let Some(items) = response.results {
            for item in items {
                if let (Some(text), Some(url)) = (item.text, item.first_url) {
                    results.push(WebSearchResultEntry {
                        title: text.clone(),
                        snippet: text,
                        url,
                    });
                }
            }
        }

        if let Some(topics) = response.related_topics {
            Self::collect_topics(&topics, &mut results);
        }

        results.truncate(max_results);
        results
    }

    async fn query(
        &self,
        args: &WebSearchArgs,
        max_results: usize,
    ) -> Result<Vec<WebSearchResultEntry>> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(anyhow!("web_search query cannot be empty"));
        }

        let mut request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("no_redirect", "1"),
            ("no_html", "1"),
            ("format", "json"),
        ]);

        if let Some(region) = &args.region {
            request = request.query(&[("kl", region.as_str())]);
        }

        let response = request
            .send()
            .await
            .context("Web search request failed")?
            .error_for_status()
            .context("Web search API returned error status")?
            .json::<DuckDuckGoResponse>()
            .await
            .context("Failed to parse web search response")?;

        Ok(Self::flatten(response, max_results))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Busca información general o actual en internet (DuckDuckGo). Úsala solo cuando la base de conocimiento no cubre la pregunta."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search keywords"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (max 20)"
                },
                "region": {
                    "type": "string",
                    "description": "Region bias (DuckDuckGo 'kl' parameter, e.g. 'pe-es')"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let args: WebSearchArgs =
            serde_json::from_value(args).context("Failed to parse web_search arguments")?;

        let max_results = args
            .max_results
            .unwrap_or(self.default_results)
            .clamp(1, HARD_MAX_RESULTS);

        let results = self.query(&args, max_results).await?;

        let response = WebSearchResponse {
            query: args.query,
            results,
        };

        Ok(ToolResult::success(
            serde_json::to_string(&response).context("Failed to serialize web search results")?,
        ))
    }
}
