use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use base64::{engine::general_purpose, Engine};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use lambda_runtime::{Error, LambdaEvent};
use tracing::info;

use crate::error::ProgramError;
use crate::handler::{ProgramHandler, ProgramResponse};
use crate::writer::Connector;

/// Returns the raw request body text, decoding it when API Gateway base64-encoded it.
fn request_body(request: &ApiGatewayProxyRequest) -> Result<String, ProgramError> {
    let Some(body) = request.body.as_deref() else {
        return Ok(String::new());
    };
    if !request.is_base64_encoded {
        return Ok(body.to_string());
    }

    let bytes = general_purpose::STANDARD
        .decode(body)
        .map_err(|e| ProgramError::MalformedInput(format!("invalid base64 body: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ProgramError::MalformedInput(format!("body is not UTF-8: {e}")))
}

fn to_proxy_response(response: ProgramResponse) -> ApiGatewayProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    ApiGatewayProxyResponse {
        status_code: i64::from(response.status),
        headers,
        body: Some(Body::Text(response.body.to_string())),
        is_base64_encoded: false,
        ..Default::default()
    }
}

pub(crate) async fn function_handler<C: Connector>(
    handler: &ProgramHandler<C>,
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (request, context) = event.into_parts();
    info!(
        request_id = %context.request_id,
        method = %request.http_method,
        path = request.path.as_deref().unwrap_or("/"),
        "program request received"
    );

    let response = match request_body(&request) {
        Ok(body) => handler.handle(&body).await,
        Err(err) => handler.reject(&err),
    };

    info!(request_id = %context.request_id, status = response.status, "program request completed");
    Ok(to_proxy_response(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::writer::fake::{FakeConnector, FakeStore};
    use lambda_runtime::Context;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn event(body: Option<&str>, is_base64_encoded: bool) -> LambdaEvent<ApiGatewayProxyRequest> {
        let request = ApiGatewayProxyRequest {
            path: Some("/programs".to_string()),
            http_method: http::Method::POST,
            body: body.map(str::to_string),
            is_base64_encoded,
            ..Default::default()
        };
        LambdaEvent::new(request, Context::default())
    }

    fn body_json(response: &ApiGatewayProxyResponse) -> Value {
        match &response.body {
            Some(Body::Text(text)) => serde_json::from_str(text).unwrap(),
            other => panic!("unexpected body {other:?}"),
        }
    }

    fn handler(store: &Arc<FakeStore>) -> ProgramHandler<FakeConnector> {
        ProgramHandler::new(
            &Config::new("postgres://db/futurePlus"),
            FakeConnector(Arc::clone(store)),
        )
    }

    #[tokio::test]
    async fn test_created_program_response() {
        let store = Arc::new(FakeStore::default());

        let response = function_handler(
            &handler(&store),
            event(Some(r#"{"title":"Intro","description":"First session"}"#), false),
        )
        .await
        .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_json(&response), json!({ "result": { "title": "Intro" } }));
        assert_eq!(store.inserted().len(), 1);
    }

    #[tokio::test]
    async fn test_base64_encoded_body() {
        let store = Arc::new(FakeStore::default());
        let encoded = general_purpose::STANDARD.encode(r#"{"title":"Intro","description":"First session"}"#);

        let response = function_handler(&handler(&store), event(Some(&encoded), true))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(store.inserted()[0].title, "Intro");
    }

    #[tokio::test]
    async fn test_invalid_base64_body_is_malformed() {
        let store = Arc::new(FakeStore::default());

        let response = function_handler(&handler(&store), event(Some("%%%"), true))
            .await
            .unwrap();

        assert_eq!(response.status_code, 500);
        assert_eq!(body_json(&response)["result"]["error"], "MalformedInput");
        assert_eq!(store.connects(), 0);
    }

    #[tokio::test]
    async fn test_missing_body_is_malformed() {
        let store = Arc::new(FakeStore::default());

        let response = function_handler(&handler(&store), event(None, false))
            .await
            .unwrap();

        assert_eq!(response.status_code, 500);
        assert_eq!(body_json(&response)["result"]["error"], "MalformedInput");
    }

    #[tokio::test]
    async fn test_missing_title_response() {
        let store = Arc::new(FakeStore::default());

        let response = function_handler(
            &handler(&store),
            event(Some(r#"{"description":"First session"}"#), false),
        )
        .await
        .unwrap();

        assert_eq!(response.status_code, 500);
        let body = body_json(&response);
        assert_eq!(body["result"]["error"], "ValidationError");
        assert_eq!(body["result"]["field"], "title");
        assert!(store.inserted().is_empty());
    }
}
