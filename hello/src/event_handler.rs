use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use lambda_runtime::{Error, LambdaEvent};
use tracing::info;

/// Smoke-test endpoint: echoes the path it was reached on.
pub(crate) async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (request, context) = event.into_parts();
    info!(
        request_id = %context.request_id,
        request = %serde_json::to_string(&request)?,
        "request"
    );

    let path = request.path.as_deref().unwrap_or("/");

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

    Ok(ApiGatewayProxyResponse {
        status_code: 200,
        headers,
        body: Some(Body::Text(format!("Hello, CDK! You've hit {path}\n"))),
        ..Default::default()
    })
}
