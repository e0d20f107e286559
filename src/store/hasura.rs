//! Hasura GraphQL user store
//!
//! Talks to a Hasura endpoint over HTTP. Expects a `user` table keyed by
//! `address` with `nonce`, `createdAt` and `updatedAt` columns.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{StoreError, UserStore};
use crate::auth::{Nonce, WalletAddress};
use crate::models::UserRecord;

const GET_USER: &str = r#"
query getUser($address: String!) {
    user_by_pk(address: $address) {
        address
        nonce
        createdAt
        updatedAt
    }
}
"#;

const CREATE_USER: &str = r#"
mutation createUser($address: String!, $nonce: Int!) {
    insert_user_one(object: { address: $address, nonce: $nonce }) {
        address
        nonce
        createdAt
        updatedAt
    }
}
"#;

const UPDATE_NONCE: &str = r#"
mutation updateNonce($address: String!, $expected: Int!, $next: Int!) {
    update_user(
        where: { address: { _eq: $address }, nonce: { _eq: $expected } }
        _set: { nonce: $next, updatedAt: "now()" }
    ) {
        affected_rows
    }
}
"#;

const PING: &str = "query ping { __typename }";

/// Hasura reports unique-key violations with this extension code
const CONSTRAINT_VIOLATION: &str = "constraint-violation";

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    code: Option<String>,
}

impl GraphQlError {
    fn is_constraint_violation(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.code.as_deref())
            .map_or(false, |code| code == CONSTRAINT_VIOLATION)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    address: String,
    nonce: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserNode> for UserRecord {
    type Error = StoreError;

    fn try_from(node: UserNode) -> Result<Self, Self::Error> {
        let address = node
            .address
            .parse::<WalletAddress>()
            .map_err(|e| StoreError::InvalidRecord(format!("{}: {}", node.address, e)))?;
        let nonce =
            Nonce::try_from(node.nonce).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        Ok(UserRecord {
            address,
            nonce,
            created_at: node.created_at,
            updated_at: node.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GetUserData {
    user_by_pk: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct CreateUserData {
    insert_user_one: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UpdateNonceData {
    update_user: Option<AffectedRows>,
}

#[derive(Debug, Deserialize)]
struct AffectedRows {
    affected_rows: u64,
}

impl CreateUserData {
    /// Hasura answers an ignored insert with `insert_user_one: null`
    fn into_record(self, address: &WalletAddress) -> Result<UserRecord, StoreError> {
        self.insert_user_one
            .ok_or_else(|| StoreError::AlreadyExists(address.clone()))?
            .try_into()
    }
}

impl UpdateNonceData {
    /// Whether the guarded update hit exactly one row
    fn swapped(&self) -> bool {
        self.update_user
            .as_ref()
            .map_or(false, |rows| rows.affected_rows == 1)
    }
}

#[derive(Clone)]
pub struct HasuraUserStore {
    client: reqwest::Client,
    endpoint: String,
    admin_secret: Option<String>,
}

impl HasuraUserStore {
    pub fn new(endpoint: String, admin_secret: Option<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            admin_secret,
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphQlResponse<T>, StoreError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables });

        if let Some(secret) = &self.admin_secret {
            request = request.header("x-hasura-admin-secret", secret);
        }

        let response = request.send().await?.error_for_status()?;

        Ok(response.json::<GraphQlResponse<T>>().await?)
    }
}

/// Collapse a GraphQL response into its data or a store error
fn into_data<T>(response: GraphQlResponse<T>, address: &WalletAddress) -> Result<T, StoreError> {
    if let Some(error) = response.errors.first() {
        if error.is_constraint_violation() {
            return Err(StoreError::AlreadyExists(address.clone()));
        }
        return Err(StoreError::Unavailable(error.message.clone()));
    }

    response
        .data
        .ok_or_else(|| StoreError::Unavailable("GraphQL response without data".to_string()))
}

#[async_trait]
impl UserStore for HasuraUserStore {
    async fn get_user(&self, address: &WalletAddress) -> Result<Option<UserRecord>, StoreError> {
        let response = self
            .execute::<GetUserData>(GET_USER, json!({ "address": address.as_str() }))
            .await?;

        into_data(response, address)?
            .user_by_pk
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn create_user(
        &self,
        address: &WalletAddress,
        nonce: Nonce,
    ) -> Result<UserRecord, StoreError> {
        let response = self
            .execute::<CreateUserData>(
                CREATE_USER,
                json!({ "address": address.as_str(), "nonce": nonce.value() }),
            )
            .await?;

        into_data(response, address)?.into_record(address)
    }

    async fn update_nonce(
        &self,
        address: &WalletAddress,
        expected: Nonce,
        next: Nonce,
    ) -> Result<bool, StoreError> {
        let response = self
            .execute::<UpdateNonceData>(
                UPDATE_NONCE,
                json!({
                    "address": address.as_str(),
                    "expected": expected.value(),
                    "next": next.value(),
                }),
            )
            .await?;

        Ok(into_data(response, address)?.swapped())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let response = self
            .execute::<serde_json::Value>(PING, json!({}))
            .await?;

        match response.errors.first() {
            Some(error) => Err(StoreError::Unavailable(error.message.clone())),
            None => Ok(()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "hasura"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> WalletAddress {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    #[test]
    fn test_parse_user_by_pk() {
        let body = r#"{
            "data": {
                "user_by_pk": {
                    "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                    "nonce": 123456,
                    "createdAt": "2024-01-01T00:00:00.123456+00:00",
                    "updatedAt": "2024-01-02T00:00:00+00:00"
                }
            }
        }"#;
        let response: GraphQlResponse<GetUserData> = serde_json::from_str(body).unwrap();

        let record: UserRecord = into_data(response, &address())
            .unwrap()
            .user_by_pk
            .unwrap()
            .try_into()
            .unwrap();

        assert_eq!(record.address, address());
        assert_eq!(record.nonce.value(), 123456);
    }

    #[test]
    fn test_missing_user() {
        let body = r#"{ "data": { "user_by_pk": null } }"#;
        let response: GraphQlResponse<GetUserData> = serde_json::from_str(body).unwrap();

        assert!(into_data(response, &address()).unwrap().user_by_pk.is_none());
    }

    #[test]
    fn test_constraint_violation_maps_to_already_exists() {
        let body = r#"{
            "errors": [{
                "message": "Uniqueness violation. duplicate key value violates unique constraint \"user_pkey\"",
                "extensions": { "path": "$.selectionSet.insert_user_one.args.object", "code": "constraint-violation" }
            }]
        }"#;
        let response: GraphQlResponse<CreateUserData> = serde_json::from_str(body).unwrap();

        assert!(matches!(
            into_data(response, &address()),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_other_errors_map_to_unavailable() {
        let body = r#"{
            "errors": [{ "message": "field 'user_by_pk' not found", "extensions": { "code": "validation-failed" } }]
        }"#;
        let response: GraphQlResponse<GetUserData> = serde_json::from_str(body).unwrap();

        assert!(matches!(
            into_data(response, &address()),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_insert_user_one() {
        let body = r#"{
            "data": {
                "insert_user_one": {
                    "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
                    "nonce": 7,
                    "createdAt": "2024-01-01T00:00:00+00:00",
                    "updatedAt": "2024-01-01T00:00:00+00:00"
                }
            }
        }"#;
        let response: GraphQlResponse<CreateUserData> = serde_json::from_str(body).unwrap();

        let record = into_data(response, &address())
            .unwrap()
            .into_record(&address())
            .unwrap();
        assert_eq!(record.nonce.value(), 7);

        let body = r#"{ "data": { "insert_user_one": null } }"#;
        let response: GraphQlResponse<CreateUserData> = serde_json::from_str(body).unwrap();

        assert!(matches!(
            into_data(response, &address()).unwrap().into_record(&address()),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_update_nonce_affected_rows() {
        let parse = |body: &str| -> bool {
            let response: GraphQlResponse<UpdateNonceData> = serde_json::from_str(body).unwrap();
            into_data(response, &address()).unwrap().swapped()
        };

        assert!(parse(r#"{ "data": { "update_user": { "affected_rows": 1 } } }"#));
        assert!(!parse(r#"{ "data": { "update_user": { "affected_rows": 0 } } }"#));
        assert!(!parse(r#"{ "data": { "update_user": null } }"#));
    }

    #[test]
    fn test_update_nonce_bumps_updated_at() {
        assert!(UPDATE_NONCE.contains(r#"_set: { nonce: $next, updatedAt: "now()" }"#));
    }

    #[test]
    fn test_out_of_range_nonce_is_invalid_record() {
        let node = UserNode {
            address: address().to_string(),
            nonce: 5_000_000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(matches!(
            UserRecord::try_from(node),
            Err(StoreError::InvalidRecord(_))
        ));
    }
}
