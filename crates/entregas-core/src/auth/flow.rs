use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::{endpoints, ApiClient, ApiError, Transport};

use super::{CredentialStore, Token};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
}

/// Payload for creating a courier account
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    #[serde(rename = "nome")]
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(rename = "telefone")]
    pub phone: String,
}

/// What the backend decided after a login, registration or code check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A token was issued and stored. Token-only responses carry no user.
    LoggedIn { user: Option<UserSummary> },
    /// A code was emailed; finish with [`AuthFlow::verify_two_factor`].
    TwoFactorRequired { email: String },
    /// The account exists but must be confirmed with
    /// [`AuthFlow::verify_registration`] before a token is issued.
    VerificationRequired { email: String },
}

#[derive(Debug, Deserialize)]
struct JwtPair {
    access: String,
}

/// Every token-bearing shape the backends answer with: a dj-rest-auth
/// `{"key"}`, the SimpleJWT `{"tokens": {"access", "refresh"}}` pair, a
/// bare `access`, or a plain `token`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthResponse {
    key: Option<String>,
    tokens: Option<JwtPair>,
    #[serde(alias = "access_token")]
    access: Option<String>,
    token: Option<String>,
    user: Option<UserSummary>,
    requires_2fa: bool,
    requires_verification: bool,
    user_email: Option<String>,
}

impl AuthResponse {
    fn into_token(self) -> Option<String> {
        self.key
            .or(self.tokens.map(|pair| pair.access))
            .or(self.access)
            .or(self.token)
    }
}

/// Login, registration and logout. The only writer of the credential store.
pub struct AuthFlow<S, T> {
    client: ApiClient<S, T>,
}

impl<S: CredentialStore, T: Transport> AuthFlow<S, T> {
    pub fn new(client: ApiClient<S, T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient<S, T> {
        &self.client
    }

    pub async fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self.client.store().get().await?.is_some())
    }

    /// Authenticate with email and password.
    ///
    /// A token is stored only for [`AuthOutcome::LoggedIn`].
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        let body = json!({ "email": email, "password": password });
        let auth: AuthResponse = self.client.post_json(endpoints::LOGIN, &body).await?;
        self.settle(auth, email).await
    }

    /// Finish a login that answered [`AuthOutcome::TwoFactorRequired`]
    pub async fn verify_two_factor(&self, email: &str, code: &str) -> Result<AuthOutcome, ApiError> {
        let body = json!({ "email": email, "code": code });
        let auth: AuthResponse = self.client.post_json(endpoints::TWO_FA_LOGIN, &body).await?;
        self.settle(auth, email).await
    }

    /// Create an account. Backends that verify new accounts answer
    /// [`AuthOutcome::VerificationRequired`] and store nothing.
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthOutcome, ApiError> {
        let auth: AuthResponse = self.client.post_json(endpoints::REGISTER, form).await?;
        self.settle(auth, &form.email).await
    }

    /// Confirm a new account with the emailed code
    pub async fn verify_registration(&self, email: &str, code: &str) -> Result<AuthOutcome, ApiError> {
        let body = json!({ "email": email, "code": code, "verification_method": "email" });
        let auth: AuthResponse = self.client.post_json(endpoints::REGISTER_VERIFY, &body).await?;
        self.settle(auth, email).await
    }

    /// Fetch the logged-in courier's profile
    pub async fn profile(&self) -> Result<UserSummary, ApiError> {
        self.client.get_json(endpoints::PROFILE).await
    }

    /// Tell the backend we're leaving, then forget the local token.
    ///
    /// The server call is best effort; the local session is cleared even if
    /// it fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.client.post(endpoints::LOGOUT, json!({})).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => {
                warn!(status = %response.status, "Server rejected logout, clearing local session anyway")
            }
            Err(e) => warn!(error = %e, "Logout request failed, clearing local session anyway"),
        }
        self.client.store().clear().await?;
        info!("Logged out");
        Ok(())
    }

    async fn settle(&self, auth: AuthResponse, email: &str) -> Result<AuthOutcome, ApiError> {
        if auth.requires_2fa {
            info!("Login needs a two-factor code");
            return Ok(AuthOutcome::TwoFactorRequired {
                email: auth.user_email.unwrap_or_else(|| email.to_string()),
            });
        }
        if auth.requires_verification {
            info!("Account awaits verification");
            return Ok(AuthOutcome::VerificationRequired {
                email: auth.user_email.unwrap_or_else(|| email.to_string()),
            });
        }

        let user = auth.user.clone();
        let raw = auth
            .into_token()
            .ok_or_else(|| ApiError::Decode("response carried no token".to_string()))?;
        let token = Token::new(raw)
            .map_err(|e| ApiError::Decode(format!("backend issued an unusable token: {}", e)))?;
        self.client.store().set(token).await?;
        info!(user_id = user.as_ref().map(|u| u.id), "Session stored");
        Ok(AuthOutcome::LoggedIn { user })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::header;
    use reqwest::StatusCode;

    use super::*;
    use crate::api::{HttpResponse, Method, TransportError};
    use crate::auth::{MemoryStore, StorageError};
    use crate::testing::{FailingStore, RecordingTransport};

    const BASE: &str = "https://api.example.test";

    const JWT_LOGIN_RESPONSE: &str = r#"{
        "success": true,
        "message": "Login realizado com sucesso",
        "requires_2fa": false,
        "tokens": {"access": "eyJ.access", "refresh": "eyJ.refresh"},
        "user": {"id": 4, "nome": "Entregador Teste", "email": "a@b.com", "username": "teste", "cpf": "12345678901", "telefone": null, "user_type": "entregador"}
    }"#;

    fn flow(
        store: MemoryStore,
    ) -> (AuthFlow<MemoryStore, Arc<RecordingTransport>>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let client = ApiClient::new(BASE, store, Arc::clone(&transport));
        (AuthFlow::new(client), transport)
    }

    fn registration_form() -> RegistrationForm {
        RegistrationForm {
            name: "Entregador Teste".to_string(),
            username: "teste".to_string(),
            email: "a@b.com".to_string(),
            password: "secret".to_string(),
            password_confirm: "secret".to_string(),
            cpf: None,
            phone: "11999990000".to_string(),
        }
    }

    async fn stored_token(flow: &AuthFlow<MemoryStore, Arc<RecordingTransport>>) -> Option<String> {
        flow.client()
            .store()
            .get()
            .await
            .unwrap()
            .map(|t| t.expose().to_string())
    }

    #[tokio::test]
    async fn test_login_with_jwt_pair_stores_access_token() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::OK, JWT_LOGIN_RESPONSE));

        let outcome = flow.login("a@b.com", "secret").await.unwrap();

        let AuthOutcome::LoggedIn { user: Some(user) } = outcome else {
            panic!("expected a logged-in user, got {:?}", outcome);
        };
        assert_eq!(user.id, 4);
        assert_eq!(user.name, "Entregador Teste");
        assert_eq!(user.username.as_deref(), Some("teste"));
        assert_eq!(user.phone, None);
        assert_eq!(stored_token(&flow).await.as_deref(), Some("eyJ.access"));

        let sent = transport.single_request();
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "https://api.example.test/api/auth/login/");
        assert_eq!(
            sent.body,
            Some(json!({"email": "a@b.com", "password": "secret"}))
        );

        // The next call carries the new token
        flow.profile().await.ok();
        assert_eq!(
            transport.requests()[1].headers[header::AUTHORIZATION],
            "Token eyJ.access"
        );
    }

    #[tokio::test]
    async fn test_login_with_rest_auth_key() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::OK, r#"{"key": "abc123"}"#));

        let outcome = flow.login("a@b.com", "secret").await.unwrap();

        assert_eq!(outcome, AuthOutcome::LoggedIn { user: None });
        assert_eq!(stored_token(&flow).await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_login_with_plain_token_field() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(
            StatusCode::OK,
            r#"{"token": "abc123", "user": {"id": 4, "nome": "Entregador Teste", "email": "a@b.com"}}"#,
        ));

        let outcome = flow.login("a@b.com", "secret").await.unwrap();

        assert!(matches!(outcome, AuthOutcome::LoggedIn { user: Some(ref u) } if u.id == 4));
        assert_eq!(stored_token(&flow).await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_login_requiring_two_factor_stores_nothing() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(
            StatusCode::OK,
            r#"{
                "success": true,
                "message": "Código de verificação enviado para seu email",
                "requires_2fa": true,
                "user_email": "a@b.com",
                "reason": "new_device"
            }"#,
        ));

        let outcome = flow.login("A@b.com", "secret").await.unwrap();

        assert_eq!(
            outcome,
            AuthOutcome::TwoFactorRequired { email: "a@b.com".to_string() }
        );
        assert!(!flow.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_two_factor_code_completes_login() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::OK, JWT_LOGIN_RESPONSE));

        let outcome = flow.verify_two_factor("a@b.com", "123456").await.unwrap();

        assert!(matches!(outcome, AuthOutcome::LoggedIn { user: Some(_) }));
        assert_eq!(stored_token(&flow).await.as_deref(), Some("eyJ.access"));
        let sent = transport.single_request();
        assert_eq!(sent.url, "https://api.example.test/api/auth/login/2fa/");
        assert_eq!(sent.body, Some(json!({"email": "a@b.com", "code": "123456"})));
    }

    #[tokio::test]
    async fn test_response_without_token_is_decode_error() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(
            StatusCode::OK,
            r#"{"success": true, "requires_2fa": false}"#,
        ));

        let err = flow.login("a@b.com", "secret").await.unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!flow.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_store_untouched() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Senha incorreta"}"#,
        ));

        let err = flow.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!flow.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_register_requiring_verification_stores_nothing() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(
            StatusCode::CREATED,
            r#"{
                "success": true,
                "requires_verification": true,
                "user_email": "a@b.com",
                "user_phone": "11999990000",
                "user_data": {"id": 4, "nome": "Entregador Teste", "email": "a@b.com"}
            }"#,
        ));

        let outcome = flow.register(&registration_form()).await.unwrap();

        assert_eq!(
            outcome,
            AuthOutcome::VerificationRequired { email: "a@b.com".to_string() }
        );
        assert!(!flow.is_authenticated().await.unwrap());

        let sent = transport.single_request();
        assert_eq!(sent.url, "https://api.example.test/api/auth/register/");
        let body = sent.body.unwrap();
        assert_eq!(body["nome"], "Entregador Teste");
        assert_eq!(body["telefone"], "11999990000");
        assert_eq!(body["password_confirm"], "secret");
        assert!(body.get("cpf").is_none());
    }

    #[tokio::test]
    async fn test_verified_registration_stores_token() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::OK, JWT_LOGIN_RESPONSE));

        let outcome = flow.verify_registration("a@b.com", "654321").await.unwrap();

        assert!(matches!(outcome, AuthOutcome::LoggedIn { .. }));
        assert!(flow.is_authenticated().await.unwrap());
        let sent = transport.single_request();
        assert_eq!(sent.url, "https://api.example.test/api/auth/register/verify/");
        assert_eq!(sent.body.unwrap()["code"], "654321");
    }

    #[tokio::test]
    async fn test_register_with_immediate_token() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::CREATED, r#"{"key": "abc123"}"#));

        flow.register(&registration_form()).await.unwrap();

        assert_eq!(stored_token(&flow).await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_unreachable() {
        let (flow, transport) = flow(MemoryStore::with_token(Token::new("abc123").unwrap()));
        transport.fail_with(TransportError::Timeout("timed out".to_string()));

        flow.logout().await.unwrap();

        assert!(!flow.is_authenticated().await.unwrap());
        let sent = transport.single_request();
        assert_eq!(sent.url, "https://api.example.test/api/auth/logout/");
        assert_eq!(sent.headers[header::AUTHORIZATION], "Token abc123");
    }

    #[tokio::test]
    async fn test_logout_when_already_logged_out() {
        let (flow, transport) = flow(MemoryStore::new());
        transport.respond_with(HttpResponse::new(StatusCode::UNAUTHORIZED, "{}"));

        flow.logout().await.unwrap();
        assert!(!flow.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_surfaces_storage_failure() {
        let transport = Arc::new(RecordingTransport::new());
        let flow = AuthFlow::new(ApiClient::new(BASE, FailingStore, Arc::clone(&transport)));

        let err = flow.logout().await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(StorageError::Backend(_))));
    }
}
