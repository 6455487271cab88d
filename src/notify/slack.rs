//! Slack channel sink: posts a one-line summary per stage transition.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackChannelId, SlackClient, SlackClientHyperHttpsConnector, SlackMessageContent,
};

use super::NotificationSink;
use crate::config::SlackConfig;
use crate::models::notification::StageTransitioned;
use crate::models::stage::Decision;
use crate::{AppError, Result};

/// Posts stage transitions to a Slack channel with the bot token.
pub struct SlackSink {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    channel: SlackChannelId,
}

impl SlackSink {
    /// Build the sink from loaded Slack settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the bot token is missing, or
    /// `AppError::Notify` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(AppError::Config("slack bot token not loaded".into()));
        }
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Notify(format!("failed to init slack connector: {err}")))?;
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };

        Ok(Self {
            client: Arc::new(SlackClient::new(connector)),
            bot_token,
            channel: SlackChannelId(config.channel_id.clone()),
        })
    }
}

fn message_text(event: &StageTransitioned) -> String {
    let marker = match (event.decision, event.next_stage) {
        (Decision::Approve, Some(_)) => "\u{2705}",
        (Decision::Approve, None) => "\u{1f389}",
        (Decision::Reject, _) => "\u{274c}",
    };
    format!("{marker} {}", event.summary())
}

impl NotificationSink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn deliver<'a>(
        &'a self,
        event: &'a StageTransitioned,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let request = SlackApiChatPostMessageRequest::new(
                self.channel.clone(),
                SlackMessageContent::new().with_text(message_text(event)),
            );
            self.client
                .open_session(&self.bot_token)
                .chat_post_message(&request)
                .await
                .map_err(|err| AppError::Notify(format!("slack post failed: {err}")))?;
            Ok(())
        })
    }
}
