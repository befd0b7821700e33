//! Account pages served through the HTTP pipeline.

use super::interaction::{Interaction, InteractionStore, LoginResult, INTERACTION_COOKIE};
use super::verifier::IdentityVerifier;
use crate::auth::UserStore;
use crate::http::HttpRequest;
use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use podium_core::{AsyncHandler, Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Paths of the account pages.
pub const INTERACTION_PATH: &str = "/.account/interaction";
pub const IDENTITY_LOGIN_PATH: &str = "/.account/login/identity";
pub const SWITCH_ACCOUNT_PATH: &str = "/.account/switch";

/// Error code of interaction-only actions performed without an interaction.
pub const NO_INTERACTION_CODE: &str = "E0002";

/// Largest JSON form accepted by the account pages.
const MAX_FORM_SIZE: usize = 64 * 1024;

fn route(input: &HttpRequest, path: &str, methods: &[Method]) -> Result<()> {
    if input.path() == path && methods.contains(input.method()) {
        Ok(())
    } else {
        Err(Error::NotSupported(format!(
            "{} {} is not {}",
            input.method(),
            input.path(),
            path
        )))
    }
}

fn current_interaction(input: &HttpRequest, store: &InteractionStore) -> Option<Interaction> {
    store.find(input.cookie(INTERACTION_COOKIE)?)
}

/// Starts login interactions and shows the current one.
///
/// `POST` with `{"return_to": ...}` creates one and sets the interaction
/// cookie, `GET` returns the interaction the cookie points to.
pub struct InteractionHandler {
    interactions: Arc<InteractionStore>,
}

impl InteractionHandler {
    pub fn new(interactions: Arc<InteractionStore>) -> Self {
        Self { interactions }
    }
}

#[derive(Debug, Deserialize)]
struct StartInteraction {
    return_to: String,
}

#[async_trait]
impl AsyncHandler<HttpRequest, Response> for InteractionHandler {
    async fn can_handle(&self, input: &HttpRequest) -> Result<()> {
        route(input, INTERACTION_PATH, &[Method::GET, Method::POST])
    }

    async fn handle(&self, input: &HttpRequest) -> Result<Response> {
        if input.method() == Method::GET {
            let interaction = current_interaction(input, &self.interactions)
                .ok_or_else(|| Error::NotFound("no active interaction".to_string()))?;
            return Ok(Json(interaction).into_response());
        }

        let form: StartInteraction = input.read_json(MAX_FORM_SIZE).await?;
        let interaction = self.interactions.create(form.return_to)?;
        let cookie = format!(
            "{}={}; Path=/.account; HttpOnly; SameSite=Lax",
            INTERACTION_COOKIE, interaction.id
        );
        Ok((
            StatusCode::CREATED,
            [(header::SET_COOKIE, cookie)],
            Json(interaction),
        )
            .into_response())
    }
}

/// Signs an agent in through the external identity service.
///
/// Expects `{"pno": "YYYYMMDDXXXX"}`, answers `{"name": ...}` once the
/// service confirmed the identity, and registers the account on first use.
pub struct IdentityVerificationHandler {
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<UserStore>,
    interactions: Arc<InteractionStore>,
    end_user_ip: String,
}

impl IdentityVerificationHandler {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        users: Arc<UserStore>,
        interactions: Arc<InteractionStore>,
        end_user_ip: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            users,
            interactions,
            end_user_ip: end_user_ip.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdentityForm {
    pno: Option<serde_json::Value>,
}

/// Accepts exactly twelve ASCII digits.
fn validate_personal_number(value: Option<&serde_json::Value>) -> Result<&str> {
    match value.and_then(|v| v.as_str()) {
        Some(pno) if pno.len() == 12 && pno.bytes().all(|b| b.is_ascii_digit()) => Ok(pno),
        _ => Err(Error::BadRequest(
            "Invalid request. The personal number must be formatted YYYYMMDDXXXX".to_string(),
        )),
    }
}

#[async_trait]
impl AsyncHandler<HttpRequest, Response> for IdentityVerificationHandler {
    async fn can_handle(&self, input: &HttpRequest) -> Result<()> {
        route(input, IDENTITY_LOGIN_PATH, &[Method::POST])
    }

    async fn handle(&self, input: &HttpRequest) -> Result<Response> {
        let form: IdentityForm = input.read_json(MAX_FORM_SIZE).await?;
        let pno = validate_personal_number(form.pno.as_ref())?;

        let collected = self
            .verifier
            .authenticate_and_collect(pno, &self.end_user_ip)
            .await?;
        let completion = collected.completion_data.ok_or_else(|| {
            Error::Upstream(
                "authentication failed, completion data missing in response".to_string(),
            )
        })?;
        let name = completion.user.name;

        let user = self.users.register_verified(pno, &name)?;
        info!(account = %user.id, "identity verified");

        if let Some(mut interaction) = current_interaction(input, &self.interactions) {
            let ttl = interaction.remaining_ttl();
            interaction.result = Some(LoginResult {
                account_id: user.id.clone(),
            });
            self.interactions.save(interaction, ttl)?;
        }

        Ok(Json(json!({ "name": name })).into_response())
    }
}

/// Handles the switch account form of a login interaction.
///
/// Posting anything but `{"operation": "continue"}` forgets who signed in so
/// the agent can log in again. Either way the agent is sent back to the
/// client with `302 Found`.
pub struct SwitchAccountHandler {
    interactions: Arc<InteractionStore>,
}

impl SwitchAccountHandler {
    pub fn new(interactions: Arc<InteractionStore>) -> Self {
        Self { interactions }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SwitchForm {
    #[serde(default)]
    operation: Option<String>,
}

#[async_trait]
impl AsyncHandler<HttpRequest, Response> for SwitchAccountHandler {
    async fn can_handle(&self, input: &HttpRequest) -> Result<()> {
        route(input, SWITCH_ACCOUNT_PATH, &[Method::GET, Method::POST])?;
        if input.method() == Method::POST && current_interaction(input, &self.interactions).is_none()
        {
            return Err(Error::BadRequest(
                "This action can only be performed as part of a login interaction.".to_string(),
            )
            .with_code(NO_INTERACTION_CODE));
        }
        Ok(())
    }

    async fn handle(&self, input: &HttpRequest) -> Result<Response> {
        if input.method() == Method::GET {
            return Ok(Json(json!({
                "required": { "operation": "string" },
                "interaction": current_interaction(input, &self.interactions),
            }))
            .into_response());
        }

        let mut interaction = current_interaction(input, &self.interactions).ok_or_else(|| {
            Error::BadRequest("login interaction expired".to_string())
                .with_code(NO_INTERACTION_CODE)
        })?;
        let form: SwitchForm = input.read_json(MAX_FORM_SIZE).await?;

        if form.operation.as_deref() != Some("continue") {
            interaction.result = None;
        }
        interaction.params.has_been_asked_to_switch_accounts = true;
        let ttl = interaction.remaining_ttl();
        let return_to = interaction.return_to.clone();
        self.interactions.save(interaction, ttl)?;

        Ok((StatusCode::FOUND, [(header::LOCATION, return_to)]).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::verifier::{CollectResponse, CollectStatus, CompletionData, VerifiedUser};
    use axum::body::Body;
    use axum::http::{HeaderMap, Uri};
    use std::time::Duration;

    struct FixedVerifier {
        completion: Option<CompletionData>,
    }

    #[async_trait]
    impl IdentityVerifier for FixedVerifier {
        async fn authenticate_and_collect(
            &self,
            personal_number: &str,
            _end_user_ip: &str,
        ) -> Result<CollectResponse> {
            Ok(CollectResponse {
                order_ref: "order".into(),
                status: CollectStatus::Complete,
                hint_code: None,
                completion_data: self.completion.clone().map(|mut c| {
                    c.user.personal_number = personal_number.to_string();
                    c
                }),
            })
        }
    }

    fn verified(name: &str) -> Option<CompletionData> {
        Some(CompletionData {
            user: VerifiedUser {
                personal_number: String::new(),
                name: name.into(),
                given_name: None,
                surname: None,
            },
        })
    }

    fn request(method: Method, path: &'static str, cookie: Option<&str>, body: &str) -> HttpRequest {
        let mut headers = HeaderMap::new();
        if let Some(id) = cookie {
            headers.insert(
                header::COOKIE,
                format!("{}={}", INTERACTION_COOKIE, id).parse().unwrap(),
            );
        }
        HttpRequest::new(method, Uri::from_static(path), headers, Body::from(body.to_string()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn identity_handler(
        completion: Option<CompletionData>,
    ) -> (IdentityVerificationHandler, Arc<UserStore>, Arc<InteractionStore>) {
        let users = Arc::new(UserStore::new());
        let interactions = Arc::new(InteractionStore::new(Duration::from_secs(60)));
        let handler = IdentityVerificationHandler::new(
            Arc::new(FixedVerifier { completion }),
            users.clone(),
            interactions.clone(),
            "127.0.0.1",
        );
        (handler, users, interactions)
    }

    #[test]
    fn test_personal_number_format() {
        assert!(validate_personal_number(Some(&json!("199001011234"))).is_ok());
        assert!(validate_personal_number(Some(&json!("9001011234"))).is_err());
        assert!(validate_personal_number(Some(&json!("19900101123X"))).is_err());
        assert!(validate_personal_number(Some(&json!(199001011234u64))).is_err());
        assert!(validate_personal_number(None).is_err());
    }

    #[tokio::test]
    async fn test_identity_login_registers_account() {
        let (handler, users, interactions) = identity_handler(verified("Ada Lovelace"));
        let interaction = interactions.create("https://app.example/cb").unwrap();

        let input = request(
            Method::POST,
            IDENTITY_LOGIN_PATH,
            Some(&interaction.id),
            r#"{"pno": "199001011234"}"#,
        );
        let response = handler.handle_safe(&input).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "name": "Ada Lovelace" }));

        let user = users.get_user_by_username("199001011234").unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ada Lovelace"));
        let stored = interactions.find(&interaction.id).unwrap();
        assert_eq!(stored.result.unwrap().account_id, user.id);
    }

    #[tokio::test]
    async fn test_missing_completion_data_is_upstream() {
        let (handler, users, _) = identity_handler(None);
        let input = request(Method::POST, IDENTITY_LOGIN_PATH, None, r#"{"pno": "199001011234"}"#);
        let err = handler.handle_safe(&input).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_personal_number() {
        let (handler, _, _) = identity_handler(verified("x"));
        let input = request(Method::POST, IDENTITY_LOGIN_PATH, None, r#"{"pno": "123"}"#);
        let err = handler.handle_safe(&input).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_switch_without_interaction() {
        let handler = SwitchAccountHandler::new(Arc::new(InteractionStore::new(
            Duration::from_secs(60),
        )));
        let input = request(Method::POST, SWITCH_ACCOUNT_PATH, None, "{}");
        let err = handler.can_handle(&input).await.unwrap_err();
        assert_eq!(err.error_code(), NO_INTERACTION_CODE);
        assert_eq!(err.kind(), podium_core::ErrorKind::BadInput);

        // viewing the form needs no interaction
        let view = request(Method::GET, SWITCH_ACCOUNT_PATH, None, "");
        assert!(handler.can_handle(&view).await.is_ok());
    }

    #[tokio::test]
    async fn test_switch_clears_result() {
        let interactions = Arc::new(InteractionStore::new(Duration::from_secs(60)));
        let mut interaction = interactions.create("https://app.example/cb").unwrap();
        interaction.result = Some(LoginResult {
            account_id: "acc".into(),
        });
        interactions
            .save(interaction.clone(), Duration::from_secs(60))
            .unwrap();
        let handler = SwitchAccountHandler::new(interactions.clone());

        let input = request(
            Method::POST,
            SWITCH_ACCOUNT_PATH,
            Some(&interaction.id),
            r#"{"operation": "switch"}"#,
        );
        let response = handler.handle_safe(&input).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://app.example/cb"
        );

        let stored = interactions.find(&interaction.id).unwrap();
        assert!(stored.result.is_none());
        assert!(stored.params.has_been_asked_to_switch_accounts);
    }

    #[tokio::test]
    async fn test_continue_keeps_result() {
        let interactions = Arc::new(InteractionStore::new(Duration::from_secs(60)));
        let mut interaction = interactions.create("https://app.example/cb").unwrap();
        interaction.result = Some(LoginResult {
            account_id: "acc".into(),
        });
        interactions
            .save(interaction.clone(), Duration::from_secs(60))
            .unwrap();
        let handler = SwitchAccountHandler::new(interactions.clone());

        let input = request(
            Method::POST,
            SWITCH_ACCOUNT_PATH,
            Some(&interaction.id),
            r#"{"operation": "continue"}"#,
        );
        handler.handle_safe(&input).await.unwrap();

        let stored = interactions.find(&interaction.id).unwrap();
        assert_eq!(stored.result.unwrap().account_id, "acc");
        assert!(stored.params.has_been_asked_to_switch_accounts);
    }
}
