//! GraphQL Integration Store
//!
//! Integration record lookups and updates against a Postgraphile-style
//! GraphQL endpoint, sent through the resilient executor with admin headers.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::mutation::{build_update_token_mutation, GraphQlRequest, TokenUpdate};
use super::IntegrationStore;
use crate::core::HttpMethod;
use crate::error::{CredentialsResult, ProtocolError};
use crate::resilience::{CallOptions, ResilientExecutor};
use crate::types::{GraphQlConfig, IntegrationRecord};

/// Header carrying the admin secret.
pub const ADMIN_SECRET_HEADER: &str = "X-Postgraphile-Admin-Secret";
/// Header carrying the role.
pub const ROLE_HEADER: &str = "X-Postgraphile-Role";

const INTEGRATION_FIELDS: &str = "
      appAccountId
      appEmail
      appId
      clientType
      contactEmail
      contactName
      createdDate
      deleted
      enabled
      expiresAt
      id
      name
      refreshToken
      resource
      syncEnabled
      token
      updatedAt
      userId";

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct IntegrationRows {
    #[serde(rename = "Calendar_Integration", default)]
    rows: Vec<IntegrationRecord>,
}

#[derive(Deserialize)]
struct UpdatedRow {
    #[serde(rename = "update_Calendar_Integration_by_pk")]
    _row: Option<Value>,
}

/// GraphQL-backed integration store.
pub struct GraphQlIntegrationStore {
    executor: Arc<ResilientExecutor>,
    config: GraphQlConfig,
}

impl GraphQlIntegrationStore {
    pub fn new(executor: Arc<ResilientExecutor>, config: GraphQlConfig) -> Self {
        Self { executor, config }
    }

    /// Send a GraphQL document and unwrap its `data`.
    async fn post<T: DeserializeOwned>(&self, request: GraphQlRequest) -> CredentialsResult<T> {
        let body = serde_json::to_value(&request).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;
        let options = CallOptions::new()
            .header(ADMIN_SECRET_HEADER, self.config.admin_secret.expose_secret().as_str())
            .header(ROLE_HEADER, self.config.role.as_str())
            .json(body);

        let response: GraphQlResponse<T> = self
            .executor
            .execute(
                HttpMethod::Post,
                &self.config.endpoint,
                options,
                &request.operation_name,
            )
            .await?;

        if !response.errors.is_empty() {
            let messages = response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProtocolError::GraphQl {
                operation: request.operation_name,
                messages,
            }
            .into());
        }

        response.data.ok_or_else(|| {
            ProtocolError::MissingData {
                operation: request.operation_name,
            }
            .into()
        })
    }

    async fn query_rows(
        &self,
        operation_name: &str,
        filters: &[(&str, &str, &str)],
    ) -> CredentialsResult<Vec<IntegrationRecord>> {
        let request = build_lookup_query(operation_name, filters);
        let data: IntegrationRows = self.post(request).await?;
        Ok(data.rows)
    }

    async fn first_row(
        &self,
        operation_name: &str,
        filters: &[(&str, &str, &str)],
    ) -> CredentialsResult<Option<IntegrationRecord>> {
        let record = self
            .query_rows(operation_name, filters)
            .await?
            .into_iter()
            .next();

        match &record {
            Some(record) => debug!(
                operation = operation_name,
                integration_id = %record.id,
                "Integration found"
            ),
            None => info!(operation = operation_name, "No integration found"),
        }
        Ok(record)
    }
}

/// Lookup query over `Calendar_Integration` filtered by equality on each
/// `(column, graphql_type, value)`.
fn build_lookup_query(operation_name: &str, filters: &[(&str, &str, &str)]) -> GraphQlRequest {
    let declarations = filters
        .iter()
        .map(|(column, ty, _)| format!("${column}: {ty}!"))
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = filters
        .iter()
        .map(|(column, _, _)| format!("{column}: {{_eq: ${column}}}"))
        .collect::<Vec<_>>()
        .join(", ");
    let variables: Map<String, Value> = filters
        .iter()
        .map(|(column, _, value)| (column.to_string(), Value::String(value.to_string())))
        .collect();

    let query = format!(
        "query {operation_name}({declarations}) {{\n  Calendar_Integration(where: {{{conditions}}}) {{{INTEGRATION_FIELDS}\n  }}\n}}"
    );

    GraphQlRequest {
        operation_name: operation_name.to_string(),
        query,
        variables,
    }
}

#[async_trait]
impl IntegrationStore for GraphQlIntegrationStore {
    async fn get_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>> {
        self.first_row(
            "getCalendarIntegration",
            &[("userId", "uuid", user_id), ("resource", "String", resource)],
        )
        .await
    }

    async fn get_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> CredentialsResult<Option<IntegrationRecord>> {
        self.first_row(
            "getCalendarIntegrationByName",
            &[("userId", "uuid", user_id), ("name", "String", name)],
        )
        .await
    }

    async fn list_by_resource(
        &self,
        user_id: &str,
        resource: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>> {
        self.query_rows(
            "getCalendarIntegrationByResource",
            &[("userId", "uuid", user_id), ("resource", "String", resource)],
        )
        .await
    }

    async fn list_by_resource_and_client_type(
        &self,
        user_id: &str,
        resource: &str,
        client_type: &str,
    ) -> CredentialsResult<Vec<IntegrationRecord>> {
        self.query_rows(
            "getCalendarIntegrationByResourceAndClientType",
            &[
                ("userId", "uuid", user_id),
                ("resource", "String", resource),
                ("clientType", "String", client_type),
            ],
        )
        .await
    }

    async fn update_token(&self, id: &str, update: &TokenUpdate) -> CredentialsResult<()> {
        let request = build_update_token_mutation(id, update, Utc::now())?;
        let _: UpdatedRow = self.post(request).await?;
        debug!(integration_id = id, ?update, "Integration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpResponse, MockHttpTransport};
    use crate::error::CredentialsError;
    use crate::resilience::MockSleeper;
    use crate::store::FieldUpdate;
    use secrecy::SecretString;

    fn store(transport: Arc<MockHttpTransport>) -> GraphQlIntegrationStore {
        let executor = ResilientExecutor::new(transport).with_sleeper(Arc::new(MockSleeper::new()));
        GraphQlIntegrationStore::new(
            Arc::new(executor),
            GraphQlConfig {
                endpoint: "https://graph.test/v1/graphql".to_string(),
                admin_secret: SecretString::new("admin-secret".to_string()),
                role: "admin".to_string(),
            },
        )
    }

    fn row(id: &str) -> Value {
        serde_json::json!({
            "id": id,
            "userId": "user-1",
            "resource": "google_calendar",
            "token": "AT0",
            "refreshToken": "RT0",
            "expiresAt": "2030-01-01T00:00:00.000Z",
            "enabled": true
        })
    }

    #[tokio::test]
    async fn test_get_by_resource_first_row() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"data": {"Calendar_Integration": [row("a"), row("b")]}}),
        );
        let store = store(transport.clone());

        let record = store
            .get_by_resource("user-1", "google_calendar")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, "a");

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.headers[ADMIN_SECRET_HEADER], "admin-secret");
        assert_eq!(request.headers[ROLE_HEADER], "admin");
        assert_eq!(request.headers["Content-Type"], "application/json");

        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["operationName"], "getCalendarIntegration");
        assert_eq!(body["variables"]["userId"], "user-1");
        assert_eq!(body["variables"]["resource"], "google_calendar");
        assert!(body["query"]
            .as_str()
            .unwrap()
            .contains("where: {userId: {_eq: $userId}, resource: {_eq: $resource}}"));
    }

    #[tokio::test]
    async fn test_absent_is_none() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &serde_json::json!({"data": {"Calendar_Integration": []}}));
        let store = store(transport);

        assert!(store.get_by_name("user-1", "Google").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_resource_and_client_type() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"data": {"Calendar_Integration": [row("a"), row("b")]}}),
        );
        let store = store(transport.clone());

        let records = store
            .list_by_resource_and_client_type("user-1", "google_calendar", "web")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);

        let body: Value =
            serde_json::from_str(transport.get_last_request().unwrap().body.as_deref().unwrap())
                .unwrap();
        assert_eq!(body["variables"]["clientType"], "web");
    }

    #[tokio::test]
    async fn test_graphql_errors() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"errors": [{"message": "permission denied"}]}),
        );
        let store = store(transport.clone());

        let error = store
            .get_by_resource("user-1", "google_calendar")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CredentialsError::Protocol(ProtocolError::GraphQl { .. })
        ));
        assert!(error.to_string().contains("permission denied"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_update_token_sparse() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"data": {"update_Calendar_Integration_by_pk": {"id": "a"}}}),
        );
        let store = store(transport.clone());

        let update = TokenUpdate::new()
            .expires_in(FieldUpdate::Set(3600))
            .enabled(true);
        store.update_token("a", &update).await.unwrap();

        let body: Value =
            serde_json::from_str(transport.get_last_request().unwrap().body.as_deref().unwrap())
                .unwrap();
        assert!(body["variables"].get("token").is_none());
        assert!(body["variables"].get("expiresAt").is_some());
        assert_eq!(body["variables"]["enabled"], true);
    }

    #[tokio::test]
    async fn test_server_error_propagates_after_retries() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::text(502, "bad gateway"));
        let store = store(transport.clone());

        let error = store
            .get_by_resource("user-1", "google_calendar")
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), Some(502));
        assert_eq!(transport.request_count(), 3);
    }
}
