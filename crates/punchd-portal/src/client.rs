use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use punchd_core::action::TimesheetActions;
use punchd_core::config::PortalConfig;
use punchd_core::types::ActionResult;

use crate::error::{PortalError, Result};

/// HTTP client for the timesheet portal.
///
/// The portal keeps a short-lived session per login; punchd never reuses
/// one across attempts. `sign_in`/`sign_out` each run the full
/// authenticate → punch → verify sequence.
pub struct PortalClient {
    client: reqwest::Client,
    cfg: PortalConfig,
}

#[derive(Serialize)]
struct LoginForm<'a> {
    company: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    /// Display name of the signed-in user; empty means the login page
    /// bounced us without a real session.
    #[serde(default)]
    display_name: String,
}

#[derive(Serialize)]
struct PunchRequest<'a> {
    direction: &'a str,
}

#[derive(Deserialize)]
struct PunchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

struct Session {
    token: String,
    display_name: String,
}

impl PortalClient {
    pub fn new(cfg: PortalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { client, cfg })
    }

    /// Log in with the company/username/password form and verify that the
    /// portal actually produced a session for a named user.
    async fn authenticate(&self) -> Result<Session> {
        let url = format!("{}/auth/login", self.cfg.base_url);
        debug!(%url, username = %self.cfg.username, "authenticating");

        let resp = self
            .client
            .post(&url)
            .form(&LoginForm {
                company: &self.cfg.company,
                username: &self.cfg.username,
                password: &self.cfg.password,
            })
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "portal login rejected");
            return Err(PortalError::Api { status, message });
        }

        let login: LoginResponse = resp.json().await?;
        let display_name = verified_display_name(&login.display_name)?;
        debug!(user = %display_name, "login confirmed");

        Ok(Session {
            token: login.token,
            display_name,
        })
    }

    async fn punch(&self, session: &Session, direction: &str) -> Result<()> {
        let url = format!("{}/attendance/punch", self.cfg.base_url);
        debug!(%url, direction, "punching");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&session.token)
            .json(&PunchRequest { direction })
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "portal punch rejected");
            return Err(PortalError::Api { status, message });
        }

        let punch: PunchResponse = resp.json().await?;
        if punch.status != "ok" {
            return Err(PortalError::Verify(format!(
                "punch not confirmed: status {:?} ({})",
                punch.status,
                punch.message.as_deref().unwrap_or("no message")
            )));
        }

        Ok(())
    }

    async fn do_sign_in(&self) -> Result<String> {
        let session = self.authenticate().await?;
        self.punch(&session, "in").await?;
        info!(user = %session.display_name, "signed in at the portal");
        Ok(session.display_name)
    }

    async fn do_sign_out(&self) -> Result<String> {
        // The portal drops idle sessions well before the end of the day,
        // so sign-out authenticates from scratch too.
        let session = self.authenticate().await?;
        self.punch(&session, "out").await?;
        info!(user = %session.display_name, "signed out at the portal");
        Ok(session.display_name)
    }
}

/// The portal's login endpoint answers 200 with an anonymous body when the
/// credentials bounce; a non-empty display name is the real success marker.
fn verified_display_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(PortalError::Verify(
            "login response carried no display name".into(),
        ));
    }
    Ok(name.to_string())
}

#[async_trait]
impl TimesheetActions for PortalClient {
    async fn sign_in(&self) -> ActionResult {
        match self.do_sign_in().await {
            Ok(name) => ActionResult::success_with(format!("as {name}")),
            Err(e) => {
                warn!(error = %e, "sign-in attempt failed");
                ActionResult::failure(e.to_string())
            }
        }
    }

    async fn sign_out(&self) -> ActionResult {
        match self.do_sign_out().await {
            Ok(name) => ActionResult::success_with(format!("as {name}")),
            Err(e) => {
                warn!(error = %e, "sign-out attempt failed");
                ActionResult::failure(e.to_string())
            }
        }
    }
}
