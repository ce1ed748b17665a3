//! GraphQL-over-HTTPS gateway for the generated notes API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{GatewayResult, RemoteGateway};
use crate::auth::{require_session, AuthProvider};
use crate::config::SyncConfig;
use notesync_api::{GatewayError, NoteRecord, ValidationError};

const NOTE_FIELDS: &str = "id name description image";

fn list_document() -> String {
    format!("query ListNoteData {{ listNoteData {{ items {{ {NOTE_FIELDS} }} }} }}")
}

fn create_document() -> String {
    format!(
        "mutation CreateNoteData($input: CreateNoteDataInput!) {{ \
         createNoteData(input: $input) {{ {NOTE_FIELDS} }} }}"
    )
}

fn delete_document() -> String {
    format!(
        "mutation DeleteNoteData($input: DeleteNoteDataInput!) {{ \
         deleteNoteData(input: $input) {{ {NOTE_FIELDS} }} }}"
    )
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<JsonValue>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlError {
    message: String,
    #[serde(default)]
    error_type: Option<String>,
}

/// The generated operation a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GraphQlOperation<'a> {
    List,
    Create { id: &'a str },
    Delete { id: &'a str },
}

#[derive(Debug, PartialEq)]
pub(crate) enum GraphQlReply {
    Data(JsonValue),
    /// A create conflicted with a record that is already persisted.
    AlreadyExists,
}

impl GraphQlReply {
    fn into_data(self) -> GatewayResult<JsonValue> {
        match self {
            GraphQlReply::Data(data) => Ok(data),
            GraphQlReply::AlreadyExists => Err(GatewayError::unknown(
                "conditional check failed outside of a create",
            )),
        }
    }
}

pub struct HttpGateway {
    endpoint: String,
    client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
}

impl HttpGateway {
    pub fn new(config: &SyncConfig, auth: Arc<dyn AuthProvider>) -> anyhow::Result<Self> {
        let endpoint = config.require_endpoint()?.to_string();
        let client = build_client(config)?;
        Ok(Self {
            endpoint,
            client,
            auth,
        })
    }

    /// Run one GraphQL document and return its classified reply.
    async fn execute(
        &self,
        operation_name: &str,
        query: String,
        variables: JsonValue,
        operation: GraphQlOperation<'_>,
    ) -> GatewayResult<GraphQlReply> {
        let session = require_session(self.auth.as_ref()).await?;

        let body = json!({
            "query": query,
            "operationName": operation_name,
            "variables": variables,
        });

        debug!(
            "[HttpGateway] Executing {} for principal={}",
            operation_name, session.principal
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&session.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = classify_transport_error(&e, &self.endpoint, operation_name);
                error!("[HttpGateway] {} failed: {}", operation_name, err);
                err
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            GatewayError::network(format!(
                "Failed to read response body from {}: {}",
                self.endpoint, e
            ))
        })?;

        if !status.is_success() {
            let err = classify_status(status, &self.endpoint, &text);
            error!("[HttpGateway] {} failed: {}", operation_name, err);
            return Err(err);
        }

        parse_graphql_body(&text, operation).map_err(|e| {
            error!("[HttpGateway] {} rejected: {}", operation_name, e);
            e
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    #[tracing::instrument(name = "gateway.http.list", skip(self))]
    async fn list(&self) -> GatewayResult<Vec<NoteRecord>> {
        let data = self
            .execute(
                "ListNoteData",
                list_document(),
                json!({}),
                GraphQlOperation::List,
            )
            .await?
            .into_data()?;
        let records = parse_list(&data)?;
        info!("[HttpGateway] Listed {} records", records.len());
        Ok(records)
    }

    #[tracing::instrument(
        name = "gateway.http.create",
        skip(self, record),
        fields(id = %record.id)
    )]
    async fn create(&self, record: &NoteRecord) -> GatewayResult<NoteRecord> {
        record.validate().map_err(validation_to_gateway)?;
        let variables = json!({ "input": record });
        let reply = self
            .execute(
                "CreateNoteData",
                create_document(),
                variables,
                GraphQlOperation::Create {
                    id: record.id.as_str(),
                },
            )
            .await?;
        match reply {
            // The first write for an id wins; a replay is a no-op
            GraphQlReply::AlreadyExists => {
                info!(
                    "[HttpGateway] {} already persisted, keeping first write",
                    record.id
                );
                Ok(record.clone())
            }
            GraphQlReply::Data(data) => parse_single(&data, "createNoteData", record.id.as_str()),
        }
    }

    #[tracing::instrument(
        name = "gateway.http.delete",
        skip(self, record),
        fields(id = %record.id)
    )]
    async fn delete(&self, record: &NoteRecord) -> GatewayResult<NoteRecord> {
        let variables = json!({ "input": { "id": record.id } });
        let data = self
            .execute(
                "DeleteNoteData",
                delete_document(),
                variables,
                GraphQlOperation::Delete {
                    id: record.id.as_str(),
                },
            )
            .await?
            .into_data()?;
        parse_single(&data, "deleteNoteData", record.id.as_str())
    }
}

pub(crate) fn build_client(config: &SyncConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

fn validation_to_gateway(err: ValidationError) -> GatewayError {
    GatewayError::unknown(format!("refusing to submit invalid record: {}", err))
}

/// Map a reqwest transport failure to a gateway error.
pub(crate) fn classify_transport_error(
    e: &reqwest::Error,
    url: &str,
    operation: &str,
) -> GatewayError {
    if e.is_timeout() {
        GatewayError::network(format!(
            "{} to {} timed out - request took too long",
            operation, url
        ))
    } else if e.is_connect() {
        GatewayError::network(format!(
            "{} to {}: connection error - check network connectivity. Error: {}",
            operation, url, e
        ))
    } else if e.is_decode() {
        GatewayError::unknown(format!(
            "{} to {}: unexpected response format. Error: {}",
            operation, url, e
        ))
    } else {
        GatewayError::network(format!("{} to {}: {}", operation, url, e))
    }
}

/// Map a non-success HTTP status to a gateway error.
pub(crate) fn classify_status(status: StatusCode, url: &str, body: &str) -> GatewayError {
    let body = if body.len() > 500 {
        format!("{}... (truncated)", body.chars().take(500).collect::<String>())
    } else {
        body.to_string()
    };
    let message = format!("HTTP {} from {}: {}", status.as_u16(), url, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::unauthorized(message),
        StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::REQUEST_TIMEOUT => GatewayError::network(message),
        _ => GatewayError::unknown(message),
    }
}

fn classify_graphql_error(
    err: &GraphQlError,
    operation: GraphQlOperation<'_>,
) -> GatewayResult<GraphQlReply> {
    let kind = err.error_type.as_deref().unwrap_or_default();
    if kind.contains("Unauthorized") || err.message.contains("Not Authorized") {
        return Err(GatewayError::unauthorized(err.message.clone()));
    }
    if kind.contains("ConditionalCheckFailed") {
        return match operation {
            GraphQlOperation::Create { .. } => Ok(GraphQlReply::AlreadyExists),
            GraphQlOperation::Delete { id } => Err(GatewayError::not_found(id)),
            GraphQlOperation::List => Err(GatewayError::unknown(format!(
                "{} ({})",
                err.message, kind
            ))),
        };
    }
    Err(GatewayError::unknown(format!("{} ({})", err.message, kind)))
}

/// True when at least one top-level field of `data` resolved.
fn has_payload(data: &JsonValue) -> bool {
    data.as_object()
        .is_some_and(|fields| fields.values().any(|value| !value.is_null()))
}

/// Classify a GraphQL response body.
///
/// Field-level errors next to a resolved payload are logged and the
/// partial data is kept. Errors only fail the call when nothing resolved.
pub(crate) fn parse_graphql_body(
    text: &str,
    operation: GraphQlOperation<'_>,
) -> GatewayResult<GraphQlReply> {
    let response: GraphQlResponse = serde_json::from_str(text)
        .map_err(|e| GatewayError::unknown(format!("Failed to parse GraphQL response: {}", e)))?;
    let errors = response.errors.unwrap_or_default();

    match response.data {
        Some(data) if has_payload(&data) => {
            for err in &errors {
                warn!(
                    "[HttpGateway] Partial response, dropping field error: {} ({})",
                    err.message,
                    err.error_type.as_deref().unwrap_or("untyped")
                );
            }
            Ok(GraphQlReply::Data(data))
        }
        data => match errors.first() {
            Some(first) => classify_graphql_error(first, operation),
            None => data.map(GraphQlReply::Data).ok_or_else(|| {
                GatewayError::unknown("GraphQL response carried neither data nor errors")
            }),
        },
    }
}

pub(crate) fn parse_list(data: &JsonValue) -> GatewayResult<Vec<NoteRecord>> {
    let items = data
        .pointer("/listNoteData/items")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| GatewayError::unknown("listNoteData.items missing from response"))?;

    // Entries the resolver could not authorize come back as null
    items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            serde_json::from_value::<NoteRecord>(item.clone())
                .map_err(|e| GatewayError::unknown(format!("Malformed note in list: {}", e)))
        })
        .collect()
}

pub(crate) fn parse_single(data: &JsonValue, field: &str, id: &str) -> GatewayResult<NoteRecord> {
    match data.get(field) {
        None | Some(JsonValue::Null) => Err(GatewayError::not_found(id)),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| GatewayError::unknown(format!("Malformed {} payload: {}", field, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_api::RecordId;

    #[test]
    fn test_parse_list_skips_null_entries() {
        let body = r#"{"data":{"listNoteData":{"items":[
            {"id":"a","name":"Groceries","description":null,"image":null},
            null,
            {"id":"b","name":"Trip","description":"Lisbon","image":"b.jpg"}
        ]}},"errors":[
            {"message":"Not Authorized to access image on type NoteData","errorType":"Unauthorized"}
        ]}"#;
        let data = parse_graphql_body(body, GraphQlOperation::List)
            .unwrap()
            .into_data()
            .unwrap();
        let records = parse_list(&data).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, RecordId::from("a"));
        assert_eq!(records[1].description.as_deref(), Some("Lisbon"));
        assert_eq!(records[1].attachment_ref.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_conditional_check_failure_on_delete_is_not_found() {
        let body = r#"{"data":{"deleteNoteData":null},"errors":[
            {"message":"The conditional request failed",
             "errorType":"DynamoDB:ConditionalCheckFailedException"}
        ]}"#;
        let err = parse_graphql_body(body, GraphQlOperation::Delete { id: "gone" }).unwrap_err();
        assert_eq!(err, GatewayError::not_found("gone"));
    }

    #[test]
    fn test_conditional_check_failure_on_create_keeps_first_write() {
        let body = r#"{"data":{"createNoteData":null},"errors":[
            {"message":"The conditional request failed",
             "errorType":"DynamoDB:ConditionalCheckFailedException"}
        ]}"#;
        let reply = parse_graphql_body(body, GraphQlOperation::Create { id: "dup" }).unwrap();
        assert_eq!(reply, GraphQlReply::AlreadyExists);
    }

    #[test]
    fn test_null_delete_payload_is_not_found() {
        let data = json!({ "deleteNoteData": null });
        assert_eq!(
            parse_single(&data, "deleteNoteData", "x").unwrap_err(),
            GatewayError::not_found("x")
        );
    }

    #[test]
    fn test_unauthorized_graphql_error() {
        let body = r#"{"errors":[
            {"message":"Not Authorized to access listNoteData on type Query",
             "errorType":"Unauthorized"}
        ]}"#;
        assert!(matches!(
            parse_graphql_body(body, GraphQlOperation::List),
            Err(GatewayError::Unauthorized { .. })
        ));

        let nulled = r#"{"data":{"listNoteData":null},"errors":[
            {"message":"Not Authorized to access listNoteData on type Query",
             "errorType":"Unauthorized"}
        ]}"#;
        assert!(matches!(
            parse_graphql_body(nulled, GraphQlOperation::List),
            Err(GatewayError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "u", ""),
            GatewayError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "u", ""),
            GatewayError::Network { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "u", &"x".repeat(800)),
            GatewayError::Unknown { message } if message.ends_with("(truncated)")
        ));
    }

    #[test]
    fn test_garbage_body_is_unknown() {
        assert!(matches!(
            parse_graphql_body("<html>", GraphQlOperation::List),
            Err(GatewayError::Unknown { .. })
        ));
    }

    #[test]
    fn test_new_requires_endpoint() {
        let auth: Arc<dyn AuthProvider> = Arc::new(crate::auth::ManualAuth::new(4));
        assert!(HttpGateway::new(&SyncConfig::default(), auth).is_err());
    }
}
