//! SmallTalk oral test client

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{ApiClient, RetryPolicy};
use crate::application::errors::ApiError;
use crate::domain::entities::constants::is_known_level;
use crate::domain::traits::{OralTest, OralTestOutcome, OralTestResult, OralTestService};

const ADDITIONAL_FIELDS: &str = "detailed_scores,strength_weaknesses,problem_statuses,problem_titles";

pub struct SmallTalkClient {
    api: ApiClient,
    url_prefix: String,
    test_id: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl SmallTalkClient {
    pub fn new(url_prefix: impl Into<String>, token: &str, test_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            api: ApiClient::new(retry).with_header("Authorization", format!("Bearer {}", token)),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            test_id: test_id.into(),
            poll_interval: Duration::from_secs(60),
            max_poll_attempts: 10,
        }
    }

    /// How often and how many times to ask for results still being processed
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }
}

/// Level from a SmallTalk score such as `B1p`. `undefined` gives an empty level.
pub fn parse_score(score: &str) -> Result<String, ApiError> {
    let score = score.trim();
    if score.eq_ignore_ascii_case("undefined") {
        return Ok(String::new());
    }
    let level = score.strip_suffix('p').unwrap_or(score).to_uppercase();
    if !is_known_level(&level) {
        return Err(ApiError::Logic(format!("unknown SmallTalk score {:?}", score)));
    }
    Ok(level)
}

/// Ids come as strings or numbers
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl OralTestService for SmallTalkClient {
    async fn send_test(&self, first_name: &str, last_name: &str, email: &str) -> Result<OralTest, ApiError> {
        let response = self
            .api
            .post_json(
                &self.url("send_test"),
                &json!({
                    "test_id": self.test_id,
                    "first_name": first_name,
                    "last_name": last_name,
                    "email": email,
                }),
                &[200],
            )
            .await?;

        let url = response.str_field("test_link")?.to_string();
        let test_id = response
            .body
            .get("interview_id")
            .and_then(id_to_string)
            .ok_or_else(|| ApiError::Json(format!("no interview_id in {}", response.body)))?;
        tracing::info!("Received SmallTalk test {} ({})", test_id, url);
        Ok(OralTest { test_id, url })
    }

    async fn get_result(&self, test_id: &str) -> Result<OralTestOutcome, ApiError> {
        let query = [("id", test_id.to_string()), ("additional_fields", ADDITIONAL_FIELDS.to_string())];

        for attempt in 1..=self.max_poll_attempts {
            let response = self.api.get(&self.url("test_status"), &query, &[200]).await?;
            match response.str_field("status")? {
                "not_started_or_in_progress" => return Ok(OralTestOutcome::NotFinished),
                "processing" => {
                    tracing::info!(
                        "SmallTalk results for {} not ready (attempt {}), waiting {:?}",
                        test_id,
                        attempt,
                        self.poll_interval
                    );
                    if attempt < self.max_poll_attempts {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                "completed" => {
                    let level = parse_score(response.str_field("score")?)?;
                    let report_url = response
                        .body
                        .get("report_url")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return Ok(OralTestOutcome::Ready(OralTestResult { level, report_url }));
                }
                other => return Err(ApiError::Logic(format!("unknown SmallTalk status {:?}", other))),
            }
        }
        Ok(OralTestOutcome::NotReadyInTime)
    }
}
