/// LMS REST API 客户端
///
/// 封装所有与 LMS 后端相关的 HTTP 调用，响应统一为 `{ "data": ..., "message": ... }` 结构
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::clients::TestGateway;
use crate::config::Config;
use crate::error::GatewayError;
use crate::models::{AttemptHistoryEntry, QuestionState, SubmissionSummary, TestDefinition};

const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong";

/// 统一响应外壳
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct StartedAttempt {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Serialize)]
struct QuestionStateUpdate<'a> {
    question_id: &'a str,
    selected_option: Option<u32>,
    state: QuestionState,
}

/// LMS HTTP 网关
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    /// 创建新的网关客户端
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| GatewayError::Request {
                endpoint: config.api_base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// 附带登录令牌
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// 登录并返回令牌
    pub async fn login(&self, email: &str, password: &str) -> Result<String, GatewayError> {
        let endpoint = "auth/login";
        let body = json!({ "email": email, "password": password });
        let request = self.request(Method::POST, endpoint).json(&body);
        let data: LoginData = self.send(endpoint, request).await?;
        Ok(data.token)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, endpoint);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 发送请求，返回原始响应体
    async fn send_raw(&self, endpoint: &str, request: RequestBuilder) -> Result<Value, GatewayError> {
        debug!("请求 API: {}", endpoint);

        let response = request
            .send()
            .await
            .map_err(|source| GatewayError::Request {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let body = read_body(endpoint, response).await?;
        debug!("API 响应 ({}): {}", endpoint, body);
        Ok(body)
    }

    /// 发送请求并解析 `data` 字段
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let body = self.send_raw(endpoint, request).await?;

        let envelope: ApiEnvelope<T> =
            serde_json::from_value(body).map_err(|e| GatewayError::Decode {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        Ok(envelope.data)
    }
}

/// 读取响应体，非 2xx 时提取错误信息
async fn read_body(endpoint: &str, response: Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| GatewayError::Request {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if !status.is_success() {
        return Err(GatewayError::BadStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: extract_error_message(&body),
        });
    }

    Ok(body)
}

/// 提取错误信息：优先 `data.message`，其次 `message`
pub fn extract_error_message(body: &Value) -> String {
    body.get("data")
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| body.get("message").and_then(|m| m.as_str()))
        .unwrap_or(FALLBACK_ERROR_MESSAGE)
        .to_string()
}

#[async_trait]
impl TestGateway for HttpGateway {
    async fn start_attempt(&self, test_id: &str) -> Result<String, GatewayError> {
        let endpoint = "testresults/create";
        let request = self
            .request(Method::POST, endpoint)
            .json(&json!({ "test_id": test_id }));
        let started: StartedAttempt = self.send(endpoint, request).await?;
        Ok(started.id)
    }

    async fn update_question_state(
        &self,
        attempt_id: &str,
        question_id: &str,
        selected_option: Option<u32>,
        state: QuestionState,
    ) -> Result<(), GatewayError> {
        let endpoint = format!("testresults/update/{}", attempt_id);
        let body = QuestionStateUpdate {
            question_id,
            selected_option,
            state,
        };
        let request = self.request(Method::PUT, &endpoint).json(&body);
        self.send_raw(&endpoint, request).await?;
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: &str) -> Result<SubmissionSummary, GatewayError> {
        let endpoint = format!("testresults/submit/{}", attempt_id);
        let request = self.request(Method::PUT, &endpoint).json(&json!({}));
        self.send(&endpoint, request).await
    }

    async fn fetch_attempt_history(
        &self,
        test_id: &str,
    ) -> Result<Vec<AttemptHistoryEntry>, GatewayError> {
        let endpoint = format!("testresults/by-test/{}", test_id);
        let request = self.request(Method::GET, &endpoint);
        self.send(&endpoint, request).await
    }

    async fn fetch_my_tests(&self) -> Result<Vec<TestDefinition>, GatewayError> {
        let endpoint = "tests/my-tests";
        let request = self.request(Method::GET, endpoint);
        self.send(endpoint, request).await
    }
}
