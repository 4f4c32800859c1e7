use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

const INTRO_SYSTEM_PROMPT: &str =
    "你是资深啤酒和威士忌的爱好者，输出自然中文，简洁生动，包含风味、场景与搭配建议。";

const PRO_INTRO_SYSTEM_PROMPT: &str =
    "你是专业的酒类从业者，参考公开评价与评分（如 Untappd），以专业但易懂的中文输出，聚焦风味与评分信息。";

#[derive(Debug, Default, Deserialize)]
pub(super) struct IntroRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct IntroResponse {
    text: String,
}

fn intro_prompt(name: &str) -> String {
    format!("请用简洁、生动的中文，面向一般消费者，用150-200字介绍产品「{name}」，突出风味、适合场景与搭配建议。")
}

fn pro_intro_prompt(name: &str, desc: &str, url: &str) -> String {
    let mut prompt = format!(
        "请以专业酒类从业者视角，基于公开资料（如 Untappd）为「{name}」撰写不超过500字的正经介绍，重点涵盖：核心风味、酒体与苦度、典型评分区间，避免夸张营销。"
    );
    if !desc.is_empty() {
        prompt.push_str(&format!("\n商品描述：{desc}"));
    }
    if !url.is_empty() {
        prompt.push_str(&format!("\n商品链接：{url}"));
    }
    prompt
}

fn trimmed(value: Option<&str>) -> &str {
    value.map_or("", str::trim)
}

pub(super) async fn intro(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<IntroRequest>, JsonRejection>,
) -> Result<Json<IntroResponse>, ApiError> {
    let body = request_body(body, &req_id)?;
    let name = required_name(&body, req_id)?;
    let text = generate(&state, "intro", name, INTRO_SYSTEM_PROMPT, &intro_prompt(name)).await;
    Ok(Json(IntroResponse { text }))
}

pub(super) async fn pro_intro(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<IntroRequest>, JsonRejection>,
) -> Result<Json<IntroResponse>, ApiError> {
    let body = request_body(body, &req_id)?;
    let name = required_name(&body, req_id)?;
    let prompt = pro_intro_prompt(
        name,
        trimmed(body.desc.as_deref()),
        trimmed(body.url.as_deref()),
    );
    let text = generate(&state, "pro-intro", name, PRO_INTRO_SYSTEM_PROMPT, &prompt).await;
    Ok(Json(IntroResponse { text }))
}

fn request_body(
    body: Result<Json<IntroRequest>, JsonRejection>,
    req_id: &RequestId,
) -> Result<IntroRequest, ApiError> {
    body.map(|Json(body)| body).map_err(|rejection| {
        ApiError::new(req_id.0.clone(), "validation_error", rejection.body_text())
    })
}

fn required_name(body: &IntroRequest, req_id: RequestId) -> Result<&str, ApiError> {
    let name = trimmed(body.name.as_deref());
    if name.is_empty() {
        return Err(ApiError::new(req_id.0, "bad_request", "missing name"));
    }
    Ok(name)
}

/// Calls the model, degrading to a placeholder text on any failure.
async fn generate(state: &AppState, kind: &str, name: &str, system: &str, prompt: &str) -> String {
    if !state.ark.is_configured() {
        return format!("未配置AI服务，产品「{name}」");
    }
    match state.ark.complete(system, prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(kind, name, error = %e, "ai intro generation failed");
            format!("暂无法生成介绍，产品「{name}」")
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use brewpick_core::{AiSettings, YouzanSettings};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::{app, config, post_json, send};
    use super::*;

    fn ai(server: &MockServer) -> AiSettings {
        AiSettings {
            api_key: Some("ark-key".to_string()),
            api_base: format!("{}/chat/completions", server.uri()),
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn pro_intro_prompt_appends_optional_context() {
        let prompt = pro_intro_prompt("Hazy IPA", "double dry hopped", "https://shop/x");
        assert!(prompt.contains("「Hazy IPA」"));
        assert!(prompt.ends_with("商品链接：https://shop/x"));
        assert!(prompt.contains("商品描述：double dry hopped"));
        assert!(!pro_intro_prompt("Stout", "", "").contains("商品描述"));
    }

    #[tokio::test]
    async fn intro_requires_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());

        let (status, json) = send(app(&config), post_json("/api/ai/intro", &json!({"name": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn intro_malformed_json_uses_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/ai/intro")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, json) = send(app(&config), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn pro_intro_without_json_content_type_uses_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/ai/pro-intro")
            .body(Body::from(r#"{"name":"Stout"}"#))
            .unwrap();

        let (status, json) = send(app(&config), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn intro_without_key_returns_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), AiSettings::default());

        let (status, json) = send(app(&config), post_json("/api/ai/intro", &json!({"name": "Stout"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "未配置AI服务，产品「Stout」");
    }

    #[tokio::test]
    async fn intro_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer ark-key"))
            .and(body_partial_json(json!({ "model": "test-model" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "麦香浓郁" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), ai(&server));

        let (status, json) = send(app(&config), post_json("/api/ai/intro", &json!({"name": "Lager"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "麦香浓郁");
    }

    #[tokio::test]
    async fn pro_intro_upstream_failure_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), YouzanSettings::default(), ai(&server));

        let (status, json) = send(
            app(&config),
            post_json("/api/ai/pro-intro", &json!({"name": "Porter", "desc": "dark"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "暂无法生成介绍，产品「Porter」");
    }
}
