use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::core::config::LlmConfig;
use crate::core::error::LlmError;
use crate::core::generator::SqlGenerator;

/// System prompt carrying the dashboard schema. Kept deliberately strict so
/// the completion is a bare statement the extractor can lift out.
const SQL_PROMPT: &str = r#"Generate SQL queries for Malawi infrastructure projects database.

IMPORTANT RULES:
1. Use ONLY lowercase column names
2. Always query from the 'proj_dashboard' table
3. Use single quotes for string values
4. Include semicolon at the end of queries
5. Keep queries simple and direct

SCHEMA:
TABLE: proj_dashboard
- projectname (TEXT)
- district (TEXT)
- projectsector (TEXT)
- projectstatus (TEXT)
- budget (NUMERIC)
- completionpercentage (NUMERIC)
- startdate (NUMERIC)
- completiondata (NUMERIC)

EXAMPLES:
Q: How many projects in Lilongwe?
SELECT COUNT(*) FROM proj_dashboard WHERE district = 'lilongwe';

Q: Total budget for all projects?
SELECT SUM(budget) FROM proj_dashboard;

Q: Projects in Infrastructure sector?
SELECT * FROM proj_dashboard WHERE LOWER(projectsector) = 'infrastructure';

Q: Projects over 50% complete?
SELECT * FROM proj_dashboard WHERE completionpercentage > 50;

Q: Average budget by district?
SELECT district, AVG(budget) FROM proj_dashboard GROUP BY district;
"#;

/// SQL generation over an OpenAI-compatible chat completions endpoint
/// (Together by default).
pub struct TogetherGenerator {
    client: reqwest::Client,
    api_key: String,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl TogetherGenerator {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::MissingApiKey("TOGETHER_API_KEY not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SqlGenerator for TogetherGenerator {
    async fn complete(&self, question: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": SQL_PROMPT},
                {"role": "user", "content": question},
            ],
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        debug!(model = %self.config.model, chars = text.len(), "received completion");
        Ok(text)
    }
}
