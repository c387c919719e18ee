use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::header::USER_AGENT;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::logger::MessageLogger;
use crate::protocol::{
    login_message, parse_devices, parse_installation_relations, parse_login_response, API_DEVICES,
    API_EVENTS, API_INSTALLATION_RELATIONS, API_LOGIN, POST_HEADERS,
};
use crate::types::{DeviceData, InstallationData};
use crate::{Error, Result};

/// Credentials, auth token and HTTP plumbing shared by every API call.
///
/// The token sits behind a mutex so that a `&Session` can re-login when the
/// server answers 401. The lock is never held across an `.await`.
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
    logger: Option<Mutex<MessageLogger>>,
}

impl Session {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        user_agent: String,
        username: String,
        password: String,
        logger: Option<MessageLogger>,
    ) -> Self {
        Self {
            http,
            base_url,
            user_agent,
            username,
            password,
            token: Mutex::new(None),
            logger: logger.map(Mutex::new),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> Option<String> {
        self.lock_token().clone()
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger {
            let mut guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
        }
    }

    pub(crate) fn log_command(&self, action: &str, device_id: &str, body: &Value) {
        self.with_logger(|l| l.log_command(action, device_id, body));
    }

    pub async fn login(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, API_LOGIN);
        debug!(url = %url, "logging in to AirzoneCloud");
        self.with_logger(|l| l.log_request("POST", API_LOGIN, None));

        let resp = self
            .http
            .post(&url)
            .header(USER_AGENT, &self.user_agent)
            .json(&login_message(&self.username, &self.password))
            .send()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;
        let status = resp.status().as_u16();
        self.with_logger(|l| l.log_response(API_LOGIN, status, &Value::Null));

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("invalid login response (HTTP {status}): {e}")))?;
        let token = parse_login_response(&body)?;
        *self.lock_token() = Some(token.clone());

        info!("login success as {}", self.username);
        Ok(token)
    }

    /// Authenticated call. A 401 triggers one re-login and a single resend;
    /// whatever the resend returns is final.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut resp = self.send(method.clone(), endpoint, params, headers, body).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.with_logger(|l| l.log_status(endpoint, StatusCode::UNAUTHORIZED.as_u16()));
            info!("got unauthorized error (token expired?), trying to reconnect");
            self.login().await?;
            resp = self.send(method, endpoint, params, headers, body).await?;
        }

        self.read_json(endpoint, resp).await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let token = self.token().unwrap_or_default();

        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("user_email", self.username.as_str()));
        query.push(("user_token", token.as_str()));

        debug!(method = %method, url = %url, "request");
        self.with_logger(|l| l.log_request(method.as_str(), endpoint, body));

        let mut builder = self
            .http
            .request(method, &url)
            .query(&query)
            .header(USER_AGENT, &self.user_agent);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    async fn read_json(&self, endpoint: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            self.with_logger(|l| l.log_status(endpoint, status.as_u16()));
            return Err(Error::Status {
                status: status.as_u16(),
                url: format!("{}{}", self.base_url, endpoint),
            });
        }

        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::Protocol(format!("invalid JSON from {endpoint}: {e}")))?
        };
        self.with_logger(|l| l.log_response(endpoint, status.as_u16(), &body));
        Ok(body)
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut params = params.to_vec();
        params.push(("format", "json".to_string()));
        self.request(Method::GET, endpoint, &params, &[], None).await
    }

    pub async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        self.request(Method::POST, endpoint, &[], POST_HEADERS, Some(payload))
            .await
    }

    pub(crate) async fn get_installation_relations(&self) -> Result<Vec<InstallationData>> {
        debug!("get_installation_relations()");
        let body = self.get(API_INSTALLATION_RELATIONS, &[]).await?;
        parse_installation_relations(&body)
    }

    pub(crate) async fn get_devices(&self, installation_id: &str) -> Result<Vec<DeviceData>> {
        debug!(installation_id, "get_devices()");
        let body = self
            .get(API_DEVICES, &[("installation_id", installation_id.to_string())])
            .await?;
        parse_devices(&body)
    }

    /// Best effort: failures are logged and reported as `None`.
    pub(crate) async fn send_event(&self, payload: &Value) -> Option<Value> {
        debug!(payload = %payload, "send event");
        match self.post(API_EVENTS, payload).await {
            Ok(result) => {
                debug!(result = %result, "event result");
                Some(result)
            }
            Err(e) => {
                error!("unable to send event to AirzoneCloud: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("logged_in", &self.lock_token().is_some())
            .finish_non_exhaustive()
    }
}
