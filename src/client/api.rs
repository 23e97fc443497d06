use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Body of a `save` call, in the service's wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    #[serde(rename = "examID")]
    pub exam_id: String,
    #[serde(rename = "studentIDNumber")]
    pub student_id_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i32>,
    pub answers: Map<String, Value>,
    /// Switches since the last acknowledged save, not the running total.
    pub tab_switch_count: i64,
    pub tab_switch_timestamps: Vec<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    #[serde(rename = "examID")]
    pub exam_id: String,
    #[serde(rename = "studentIDNumber")]
    pub student_id_number: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub exam_code: Option<String>,
    #[serde(default)]
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub page_number: i32,
    #[serde(default)]
    pub tab_switch_count: i64,
    #[serde(default)]
    pub tab_switch_timestamps: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAck {
    pub message: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("could not reach the exam service: {0}")]
    Network(String),
    #[error("the exam service is unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response from the exam service: {0}")]
    Decode(String),
}

impl ClientError {
    /// Worth retrying later without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }

    /// The record is completed and the service refuses further changes.
    pub fn is_completed_conflict(&self) -> bool {
        matches!(self, Self::Rejected { status: 409, .. })
    }
}

#[async_trait]
pub trait ExamInfoApi: Send + Sync {
    /// `Ok(None)` means the student has never saved this exam.
    async fn load(
        &self,
        exam_id: &str,
        student_id_number: &str,
    ) -> Result<Option<RecordView>, ClientError>;

    async fn save(&self, payload: &SavePayload) -> Result<SaveAck, ClientError>;
}

/// `ExamInfoApi` over HTTP against `POST {base_url}/exam/info`.
#[derive(Debug, Clone)]
pub struct HttpExamInfoClient {
    client: Client,
    endpoint: String,
}

impl HttpExamInfoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;

        Ok(Self { client, endpoint: format!("{}/exam/info", base_url.trim_end_matches('/')) })
    }

    async fn call(&self, body: Value) -> Result<(StatusCode, Value), ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Network(err.to_string()))?;

        let status = response.status();
        let raw = response.text().await.map_err(|err| ClientError::Network(err.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&raw).map_err(|err| {
            ClientError::Decode(format!("non-JSON body (status {status}): {err}"))
        })?;
        Ok((status, parsed))
    }
}

#[async_trait]
impl ExamInfoApi for HttpExamInfoClient {
    async fn load(
        &self,
        exam_id: &str,
        student_id_number: &str,
    ) -> Result<Option<RecordView>, ClientError> {
        let body = json!({
            "action": "load",
            "examID": exam_id,
            "studentIDNumber": student_id_number,
        });
        let (status, body) = self.call(body).await?;
        interpret_load(status.as_u16(), body)
    }

    async fn save(&self, payload: &SavePayload) -> Result<SaveAck, ClientError> {
        let (status, body) = self.call(save_body(payload)?).await?;
        interpret_save(status.as_u16(), body)
    }
}

pub(crate) fn save_body(payload: &SavePayload) -> Result<Value, ClientError> {
    let mut body =
        serde_json::to_value(payload).map_err(|err| ClientError::Decode(err.to_string()))?;
    if let Some(object) = body.as_object_mut() {
        object.insert("action".to_string(), json!("save"));
    }
    Ok(body)
}

pub(crate) fn interpret_load(status: u16, body: Value) -> Result<Option<RecordView>, ClientError> {
    match status {
        200 => {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            serde_json::from_value(data)
                .map(Some)
                .map_err(|err| ClientError::Decode(format!("load data: {err}")))
        }
        404 if body.get("data").is_some_and(Value::is_null) => Ok(None),
        _ => Err(failure(status, &body)),
    }
}

pub(crate) fn interpret_save(status: u16, body: Value) -> Result<SaveAck, ClientError> {
    if status == 200 && body.get("success").and_then(Value::as_bool) == Some(true) {
        return serde_json::from_value(body)
            .map_err(|err| ClientError::Decode(format!("save acknowledgement: {err}")));
    }
    Err(failure(status, &body))
}

fn failure(status: u16, body: &Value) -> ClientError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message in response")
        .to_string();

    match status {
        502..=504 => ClientError::Unavailable(message),
        _ => ClientError::Rejected { status, message },
    }
}
