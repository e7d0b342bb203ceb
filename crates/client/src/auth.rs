//! Client for the browser-automation delegate that logs in to fnOS and
//! computes the per-request `authx` signature.

use fnos_proxy_core::model::Credential;
use fnos_proxy_proto::{
    LoginResponse, SignRequest, SignResponse, DELEGATE_LOGIN_PATH, DELEGATE_SIGN_PATH,
    SIGN_STATUS_SUCCESS,
};
use serde_json::Value;
use tracing::debug;

use crate::{read_json, trim_base, ClientError};

#[derive(Clone, Debug)]
pub struct AuthDelegateClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthDelegateClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }

    /// Session cookies from the delegate's logged-in browser.
    pub async fn login(&self) -> Result<Vec<Credential>, ClientError> {
        let url = format!("{}{}", self.base_url, DELEGATE_LOGIN_PATH);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::transport("delegate login", e))?;
        let body: LoginResponse = read_json(resp, "delegate login").await?;
        debug!(cookies = body.data.len(), "delegate login returned cookies");
        Ok(body.data)
    }

    /// Signature for one request. `url` is the path plus query exactly as it
    /// will be sent; a signature is valid for that request only.
    pub async fn sign(
        &self,
        method: &str,
        url: &str,
        data: Option<Value>,
        params: Option<Value>,
    ) -> Result<String, ClientError> {
        let req = SignRequest {
            method: method.to_string(),
            url: url.to_string(),
            data,
            params,
        };
        let endpoint = format!("{}{}", self.base_url, DELEGATE_SIGN_PATH);
        let resp = self
            .http
            .post(endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|e| ClientError::transport("delegate sign", e))?;
        let body: SignResponse = read_json(resp, "delegate sign").await?;
        if body.status != SIGN_STATUS_SUCCESS {
            return Err(ClientError::SignRejected(body.status));
        }
        Ok(body.result)
    }
}
