//! Numerai tournament API client.
//!
//! Everything goes through a single GraphQL endpoint; file transfers use
//! plain HTTP against the signed URLs the API hands out.
//!
//! API: `https://api-tournament.numer.ai` (POST, JSON `{query, variables}`)
//! Auth: Not required for reads; `Authorization: Token {public_id}${secret}`
//! for uploads and submission status.
//! Errors: HTTP 200 with a non-empty `errors` array.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{round_leaderboard, RawLeaderboardEntry, RawSubmissionStatus, TournamentGateway};
use crate::config::ApiConfig;
use crate::types::Credentials;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const DATASET_QUERY: &str = "query { dataset }";

const CURRENT_ROUND_QUERY: &str = r#"
    query {
      rounds(number: 0) {
        number
      }
    }
"#;

const UPLOAD_AUTH_QUERY: &str = r#"
    query($filename: String!) {
      submission_upload_auth(filename: $filename) {
        filename
        url
      }
    }
"#;

const CREATE_SUBMISSION_MUTATION: &str = r#"
    mutation($filename: String!) {
      create_submission(filename: $filename) {
        id
      }
    }
"#;

const SUBMISSION_STATUS_QUERY: &str = r#"
    query($submission_id: String) {
      submissions(id: $submission_id) {
        originality {
          pending
          value
        }
        concordance {
          pending
          value
        }
        consistency
        validation_logloss
      }
    }
"#;

const LEADERBOARD_QUERY: &str = r#"
    query($number: Int!) {
      rounds(number: $number) {
        leaderboard {
          consistency
          concordance {
            pending
            value
          }
          originality {
            pending
            value
          }
          liveLogloss
          submissionId
          username
          validationLogloss
          paymentGeneral {
            nmrAmount
            usdAmount
          }
          paymentStaking {
            nmrAmount
            usdAmount
          }
        }
      }
    }
"#;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP gateway to the Numerai tournament.
pub struct NumeraiClient {
    http: Client,
    api_url: String,
}

impl NumeraiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for Numerai")?;

        Ok(Self {
            http,
            api_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a GraphQL request and return the response body.
    async fn graphql(
        &self,
        query: &str,
        variables: Value,
        creds: Option<&Credentials>,
    ) -> Result<Value> {
        let body = json!({ "query": query, "variables": variables });

        let mut req = self.http.post(&self.api_url).json(&body);
        if let Some(creds) = creds {
            req = req.header("Authorization", creds.auth_header());
        }

        let resp = req.send().await.context("Numerai API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Numerai API error {status}: {text}");
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse Numerai API response")?;
        check_graphql_errors(&body)?;
        Ok(body)
    }
}

/// Turn a GraphQL `errors` array into an error.
fn check_graphql_errors(body: &Value) -> Result<()> {
    let Some(errors) = body.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<&str> = errors
        .iter()
        .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
        .collect();
    bail!("Numerai API returned errors: {}", messages.join("; "))
}

fn submission_from_response(body: Value) -> Result<RawSubmissionStatus> {
    let submission = match body.pointer("/data/submissions") {
        Some(Value::Array(list)) => list.first().cloned(),
        Some(obj @ Value::Object(_)) => Some(obj.clone()),
        _ => None,
    };
    match submission {
        Some(Value::Object(map)) => Ok(map),
        _ => bail!("Submission status missing from response"),
    }
}

fn current_round_from_response(body: &Value) -> Result<u32> {
    let number = body
        .pointer("/data/rounds/0/number")
        .and_then(Value::as_u64)
        .context("Current round missing from response")?;
    u32::try_from(number).context("Round number out of range")
}

// ---------------------------------------------------------------------------
// TournamentGateway trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TournamentGateway for NumeraiClient {
    async fn get_dataset_url(&self) -> Result<String> {
        let body = self.graphql(DATASET_QUERY, json!({}), None).await?;
        let url = body
            .pointer("/data/dataset")
            .and_then(Value::as_str)
            .context("Dataset URL missing from response")?;
        debug!(url, "Resolved dataset URL");
        Ok(url.to_string())
    }

    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let mut resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Dataset download request failed")?;

        if !resp.status().is_success() {
            bail!("Dataset download failed with status {}", resp.status());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut bytes: u64 = 0;
        while let Some(chunk) = resp.chunk().await.context("Dataset download interrupted")? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        info!(path = %dest.display(), bytes, "Download complete");
        Ok(())
    }

    async fn upload_predictions(&self, path: &Path, creds: &Credentials) -> Result<String> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .with_context(|| format!("Not a file path: {}", path.display()))?;

        let auth = self
            .graphql(UPLOAD_AUTH_QUERY, json!({ "filename": filename }), Some(creds))
            .await?;
        let signed_url = auth
            .pointer("/data/submission_upload_auth/url")
            .and_then(Value::as_str)
            .context("Upload URL missing from response")?;
        let remote_name = auth
            .pointer("/data/submission_upload_auth/filename")
            .and_then(Value::as_str)
            .context("Upload filename missing from response")?
            .to_string();

        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let put = self
            .http
            .put(signed_url)
            .body(contents)
            .send()
            .await
            .context("Predictions upload failed")?;
        if !put.status().is_success() {
            bail!("Predictions upload failed with status {}", put.status());
        }

        let created = self
            .graphql(
                CREATE_SUBMISSION_MUTATION,
                json!({ "filename": remote_name }),
                Some(creds),
            )
            .await?;
        let upload_id = created
            .pointer("/data/create_submission/id")
            .and_then(Value::as_str)
            .context("Submission id missing from response")?;

        info!(upload_id, file = filename, "Predictions uploaded");
        Ok(upload_id.to_string())
    }

    async fn submission_status(
        &self,
        upload_id: &str,
        creds: &Credentials,
    ) -> Result<RawSubmissionStatus> {
        let body = self
            .graphql(
                SUBMISSION_STATUS_QUERY,
                json!({ "submission_id": upload_id }),
                Some(creds),
            )
            .await?;
        submission_from_response(body)
    }

    async fn raw_query(&self, query: &str, variables: Value) -> Result<Value> {
        self.graphql(query, variables, None).await
    }

    async fn get_leaderboard(&self, round: u32) -> Result<Vec<RawLeaderboardEntry>> {
        let body = self
            .graphql(LEADERBOARD_QUERY, json!({ "number": round }), None)
            .await?;
        let entries: Vec<RawLeaderboardEntry> = round_leaderboard(body)
            .with_context(|| format!("Failed to read leaderboard for round {round}"))?;
        debug!(round, entries = entries.len(), "Leaderboard fetched");
        Ok(entries)
    }

    async fn get_current_round(&self) -> Result<u32> {
        let body = self.graphql(CURRENT_ROUND_QUERY, json!({}), None).await?;
        current_round_from_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
