//! Auth endpoints: login, registration, logout and the current-user profile.

use crate::client::TryoutLinkClient;
use crate::error::Result;
use crate::models::{
    AuthResponse, LoginRequest, LogoutResponse, MeResponse, RefreshRequest, RegisterRequest,
    UpdateProfileRequest, User,
};
use crate::pipeline::RequestConfig;
use log::{debug, warn};

impl TryoutLinkClient {
    /// Log in with email and password and store the session.
    ///
    /// `remember_me` selects durable storage for the token pair; otherwise it
    /// only lives as long as the process.
    ///
    /// # Example
    /// ```rust,no_run
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use tryout_link::TryoutLinkClient;
    ///
    /// let client = TryoutLinkClient::builder()
    ///     .base_url("http://localhost:3000/api")
    ///     .build()?;
    ///
    /// let auth = client.login("a@x.com", "Passw0rd", true).await?;
    /// assert!(client.session().is_authenticated());
    /// println!("Welcome {}", auth.user.email);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> Result<AuthResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .post_with(&self.routes().login, &body, RequestConfig::new().skip_auth())
            .await?;

        debug!("[AUTH] Logged in user {}", response.user.id);
        self.session()
            .set_auth(Some(response.user.clone()), response.tokens.clone(), remember_me);
        Ok(response)
    }

    /// Create an account and store the resulting session.
    pub async fn register(&self, request: &RegisterRequest, remember_me: bool) -> Result<AuthResponse> {
        let response: AuthResponse = self
            .post_with(&self.routes().register, request, RequestConfig::new().skip_auth())
            .await?;

        debug!("[AUTH] Registered user {}", response.user.id);
        self.session()
            .set_auth(Some(response.user.clone()), response.tokens.clone(), remember_me);
        Ok(response)
    }

    /// Revoke the refresh token on the server and clear the local session.
    ///
    /// The local session is cleared even if the server call fails.
    pub async fn logout(&self) -> Result<()> {
        if let Some(refresh_token) = self.session().refresh_token() {
            let body = RefreshRequest { refresh_token };
            let result: Result<LogoutResponse> = self
                .post_with(&self.routes().logout, &body, RequestConfig::new().skip_auth())
                .await;
            if let Err(e) = result {
                warn!("[AUTH] Server-side logout failed: {}", e);
            }
        }
        self.session().clear_auth();
        debug!("[AUTH] Logged out");
        Ok(())
    }

    /// Fetch the current user's profile.
    pub async fn me(&self) -> Result<User> {
        let response: MeResponse = self.get(&self.routes().me).await?;
        Ok(response.user)
    }

    /// Edit the current user's profile and update the session's user.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User> {
        let response: MeResponse = self.patch(&self.routes().me, request).await?;
        self.session().update_user(response.user.clone());
        Ok(response.user)
    }
}
