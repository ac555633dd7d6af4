// Image-to-text OCR via the anti-captcha HTTP API. Used when no local
// tesseract binary is available on the worker host.

use crate::{Error, OcrBackend, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const CREATE_TASK_URL: &str = "https://api.anti-captcha.com/createTask";
const GET_RESULT_URL: &str = "https://api.anti-captcha.com/getTaskResult";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    client_key: String,
    task: CaptchaTask,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum CaptchaTask {
    #[serde(rename = "ImageToTextTask")]
    ImageToText {
        /// Base64-encoded image body.
        body: String,
        /// Workers must transcribe, not compute; the arithmetic is ours.
        math: u8,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    error_id: u32,
    error_code: Option<String>,
    task_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetResultRequest {
    client_key: String,
    task_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetResultResponse {
    error_id: u32,
    error_code: Option<String>,
    #[serde(default)]
    ready: bool,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    text: Option<String>,
}

/// OCR backend backed by the anti-captcha image-to-text service.
pub struct AntiCaptchaOcr {
    client: reqwest::Client,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AntiCaptchaOcr {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            poll_interval: Duration::from_millis(500),
            // Image tasks usually resolve in a few seconds; a minute is
            // already generous.
            max_polls: 120,
        }
    }
}

#[async_trait]
impl OcrBackend for AntiCaptchaOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let request = CreateTaskRequest {
            client_key: self.api_key.clone(),
            task: CaptchaTask::ImageToText {
                body: base64::engine::general_purpose::STANDARD.encode(image),
                math: 0,
            },
        };

        let response: CreateTaskResponse = self
            .client
            .post(CREATE_TASK_URL)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if response.error_id != 0 {
            return Err(Error::Service(format!(
                "createTask failed: {} - {}",
                response.error_id,
                response.error_code.unwrap_or_default()
            )));
        }
        let task_id = response
            .task_id
            .ok_or_else(|| Error::Service("no task id returned".into()))?;

        for attempt in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let result: GetResultResponse = self
                .client
                .post(GET_RESULT_URL)
                .json(&GetResultRequest {
                    client_key: self.api_key.clone(),
                    task_id,
                })
                .send()
                .await?
                .json()
                .await?;

            if result.error_id != 0 {
                return Err(Error::Service(format!(
                    "getTaskResult failed: {} - {}",
                    result.error_id,
                    result.error_code.unwrap_or_default()
                )));
            }

            if result.ready {
                return result
                    .solution
                    .and_then(|s| s.text)
                    .ok_or_else(|| Error::Service("no solution text in response".into()));
            }

            if attempt > 0 && attempt % 10 == 0 {
                debug!(task_id, attempt, "captcha transcription still pending");
            }
        }

        Err(Error::Service("captcha transcription timed out".into()))
    }
}
