//! Handles POST /api/{action} - protected user-data calls

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;

use super::context::AppState;
use super::middleware_auth::Authenticated;
use crate::authz::cross_account_guard;
use crate::errors::{DenialError, GatewayError};
use crate::storage::ServerUser;

/// Actions reachable under `/api`, keyed by path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDataAction {
    ReadUser,
    UpdateUser,
}

impl FromStr for UserDataAction {
    type Err = DenialError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "readUser" => Ok(Self::ReadUser),
            "updateUser" => Ok(Self::UpdateUser),
            other => Err(DenialError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadUserRequest {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    user_id: String,
    display_name: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, DenialError> {
    serde_json::from_slice(body).map_err(|e| DenialError::MalformedRequest(e.to_string()))
}

pub async fn handle_user_data(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Authenticated(auth): Authenticated,
    body: Bytes,
) -> Result<Json<ServerUser>, GatewayError> {
    match action.parse::<UserDataAction>()? {
        UserDataAction::ReadUser => {
            let request: ReadUserRequest = if body.is_empty() {
                ReadUserRequest::default()
            } else {
                parse_body(&body)?
            };
            if let Some(user_id) = request.user_id.as_deref() {
                cross_account_guard(&auth.user, user_id)?;
            }
            Ok(Json(auth.user))
        }
        UserDataAction::UpdateUser => {
            let request: UpdateUserRequest = parse_body(&body)?;
            cross_account_guard(&auth.user, &request.user_id)?;

            let user = state
                .user_store
                .update_display_name(&auth.user.user_id, request.display_name.as_deref())
                .await?;

            tracing::info!(user_id = %user.user_id, "user updated");
            Ok(Json(user))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_map() {
        assert_eq!("readUser".parse::<UserDataAction>().unwrap(), UserDataAction::ReadUser);
        assert_eq!(
            "updateUser".parse::<UserDataAction>().unwrap(),
            UserDataAction::UpdateUser
        );
        assert!(matches!(
            "deleteUser".parse::<UserDataAction>(),
            Err(DenialError::UnknownAction(_))
        ));
        assert!("ReadUser".parse::<UserDataAction>().is_err());
    }
}
