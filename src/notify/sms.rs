//! SMS gateway sink: texts the requesting staff member on every transition.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use super::NotificationSink;
use crate::config::SmsConfig;
use crate::models::notification::StageTransitioned;
use crate::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON body accepted by the gateway.
#[derive(Debug, Serialize)]
struct SmsPayload<'a> {
    sender_id: &'a str,
    recipient: &'a str,
    message: String,
    reference: &'a str,
}

/// Sends stage transitions to the requester's phone through an HTTP gateway.
pub struct SmsGatewaySink {
    client: reqwest::Client,
    gateway_url: String,
    sender_id: String,
    api_key: String,
}

impl SmsGatewaySink {
    /// Build the sink from loaded SMS settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the API key is missing, or
    /// `AppError::Notify` if the HTTP client cannot be built.
    pub fn new(config: &SmsConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::Config("sms api key not loaded".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.clone(),
            sender_id: config.sender_id.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl NotificationSink for SmsGatewaySink {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn deliver<'a>(
        &'a self,
        event: &'a StageTransitioned,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let payload = SmsPayload {
                sender_id: &self.sender_id,
                recipient: &event.phone,
                message: event.summary(),
                reference: &event.request_id,
            };
            let response = self
                .client
                .post(&self.gateway_url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Notify(format!("sms gateway returned {status}")));
            }
            Ok(())
        })
    }
}
