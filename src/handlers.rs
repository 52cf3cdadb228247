/// Axum handlers for the relay
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::models::{ChatReply, GatewayRequest, GatewayResponse, InboundChatRequest};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{State, rejection::BytesRejection},
    http::{Method, Request, StatusCode, Uri},
    response::Html,
};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use tracing::{debug, error, info, instrument, warn};

const LANDING_PAGE: &str = include_str!("../static/index.html");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serves the chat page.
#[instrument]
pub async fn index_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Forwards a single chat message to the gateway and classifies its reply.
///
/// A body that can't be read or decoded is treated as an empty message. Every other failure is
/// mapped onto a [`RelayError`], so the page always gets JSON back.
#[instrument(skip(state, body))]
pub async fn chat_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatReply>, RelayError> {
    let inbound = match body {
        Ok(bytes) => serde_json::from_slice::<InboundChatRequest>(&bytes).unwrap_or_else(|e| {
            debug!("Inbound body is not a chat request: {}", e);
            InboundChatRequest::default()
        }),
        Err(rejection) => {
            warn!("Failed to read inbound body: {}", rejection);
            InboundChatRequest::default()
        }
    };

    let Some(message) = inbound.trimmed_message() else {
        debug!("Rejecting empty message");
        return Err(RelayError::MissingMessage);
    };

    let target = &state.target;
    let payload = GatewayRequest::single_turn(&target.provider, message);
    let body_bytes = serde_json::to_vec(&payload).map_err(|e| {
        error!("Failed to serialize gateway request: {}", e);
        RelayError::Internal(e.to_string())
    })?;

    let upstream_url = target.chat_completions_url();
    let upstream_uri: Uri = upstream_url.parse().map_err(|e| {
        error!("Invalid URI: {}", upstream_url);
        RelayError::Internal(format!("invalid gateway URL {upstream_url}: {e}"))
    })?;

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(upstream_uri.clone())
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json");

    // Keep the host header in line with the gateway rather than whatever the client sent us.
    if let Some(host) = upstream_uri.host() {
        let host_value = if let Some(port) = upstream_uri.port_u16() {
            format!("{host}:{port}")
        } else {
            host.to_string()
        };
        builder = builder.header(HOST, host_value);
    }

    if let Some(token) = target.bearer_token() {
        debug!("Adding authorization header for {}", upstream_url);
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    } else {
        debug!("No bearer configured for {}", upstream_url);
    }

    let req = builder.body(Body::from(body_bytes)).map_err(|e| {
        error!("Failed to build gateway request: {}", e);
        RelayError::Internal(e.to_string())
    })?;

    info!(
        provider = %target.provider,
        message_len = message.len(),
        "Forwarding message to gateway"
    );

    // The timeout spans the whole exchange, including reading the body.
    let exchange = async {
        let response = state.http_client.request(req).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok::<(StatusCode, Bytes), BoxError>((status, bytes))
    };

    let (status, response_bytes) = match tokio::time::timeout(target.timeout, exchange).await {
        Ok(Ok(exchanged)) => exchanged,
        Ok(Err(e)) => {
            let details = describe_error(&*e);
            error!("Error forwarding request to {}: {}", upstream_url, details);
            return Err(RelayError::Unreachable(details));
        }
        Err(_) => {
            error!(
                "Request to {} timed out after {:?}",
                upstream_url, target.timeout
            );
            return Err(RelayError::Unreachable(format!(
                "Request to {upstream_url} timed out after {} seconds",
                target.timeout.as_secs_f64()
            )));
        }
    };

    if !status.is_success() {
        warn!("Gateway returned HTTP {}", status.as_u16());
        return Err(RelayError::UpstreamStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&response_bytes).into_owned(),
        });
    }

    let decoded: serde_json::Value = serde_json::from_slice(&response_bytes).map_err(|e| {
        error!("Gateway response is not JSON: {}", e);
        RelayError::Internal(e.to_string())
    })?;

    let reply = match GatewayResponse::reply_text(&decoded) {
        Some(reply) => reply,
        None => {
            warn!("Gateway response has no string content at choices[0].message.content");
            return Err(RelayError::UnexpectedFormat(decoded));
        }
    };

    let reply = ChatReply::from_gateway_text(reply);
    info!(
        status = ?reply.status,
        rejection_type = ?reply.rejection_type,
        "Gateway replied"
    );
    Ok(Json(reply))
}

/// Renders an error and its sources as a single line, outermost first.
fn describe_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
