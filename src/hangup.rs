//! Call termination against the Twilio REST API.
//!
//! One client is built at startup and shared by every call; reqwest's
//! client is internally reference-counted and safe for concurrent use.

use anyhow::{Context, Result};
use reqwest::Client;

pub struct TwilioClient {
    http: Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String, api_base: String) -> Self {
        Self {
            http: Client::new(),
            account_sid,
            auth_token,
            api_base,
        }
    }

    fn complete_call_request(&self, call_sid: &str) -> Result<reqwest::Request> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base, self.account_sid, call_sid
        );
        self.http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Status", "completed")])
            .build()
            .context("Failed to build Twilio status update request")
    }

    /// Ask Twilio to mark the call completed, which hangs it up.
    ///
    /// Errors are for the caller to log; the session closes locally either
    /// way and the telephony side times the stream out on its own.
    pub async fn complete_call(&self, call_sid: &str) -> Result<()> {
        let request = self.complete_call_request(call_sid)?;
        let response = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("Twilio status update failed for call {}", call_sid))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Twilio returned HTTP {} for call {}",
                response.status(),
                call_sid
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_status_update_request() {
        let client = TwilioClient::new(
            "AC00000000000000000000000000000000".to_string(),
            "secret".to_string(),
            "https://api.twilio.com".to_string(),
        );
        let request = client.complete_call_request("CA1234").unwrap();

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.twilio.com/2010-04-01/Accounts/AC00000000000000000000000000000000/Calls/CA1234.json"
        );
        assert!(request.headers().contains_key(reqwest::header::AUTHORIZATION));

        let body = request.body().unwrap().as_bytes().unwrap();
        assert_eq!(body, b"Status=completed");
    }
}
