use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EditInteractionResponse, Http,
};
use vcwarden_commands::{CommandResponder, InfoCard};
use vcwarden_core::TransportResult;

use crate::transport_error;

pub fn info_card_embed(card: InfoCard) -> CreateEmbed {
    card.fields.into_iter().fold(
        CreateEmbed::new().title(card.title).color(card.color),
        |embed, field| embed.field(field.name, field.value, false),
    )
}

/// Answers one slash command interaction. Every message is ephemeral.
pub struct InteractionResponder {
    http: Arc<Http>,
    interaction: CommandInteraction,
}

impl InteractionResponder {
    pub fn new(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self { http, interaction }
    }
}

#[async_trait]
impl CommandResponder for InteractionResponder {
    async fn defer(&self) -> TransportResult<()> {
        self.interaction
            .defer_ephemeral(&self.http)
            .await
            .map_err(|error| transport_error("defer reply", error))
    }

    async fn edit_reply(&self, content: String) -> TransportResult<()> {
        self.interaction
            .edit_response(&self.http, EditInteractionResponse::new().content(content))
            .await
            .map(|_| ())
            .map_err(|error| transport_error("edit reply", error))
    }

    async fn edit_reply_card(&self, card: InfoCard) -> TransportResult<()> {
        self.interaction
            .edit_response(
                &self.http,
                EditInteractionResponse::new().embed(info_card_embed(card)),
            )
            .await
            .map(|_| ())
            .map_err(|error| transport_error("edit reply", error))
    }

    async fn follow_up(&self, content: String) -> TransportResult<()> {
        self.interaction
            .create_followup(
                &self.http,
                CreateInteractionResponseFollowup::new()
                    .content(content)
                    .ephemeral(true),
            )
            .await
            .map(|_| ())
            .map_err(|error| transport_error("follow up", error))
    }

    async fn reply_ephemeral(&self, content: String) -> TransportResult<()> {
        self.interaction
            .create_response(
                &self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(true),
                ),
            )
            .await
            .map_err(|error| transport_error("reply", error))
    }
}

#[cfg(test)]
mod tests {
    use vcwarden_commands::InfoField;

    use super::*;

    #[test]
    fn unit_info_card_embed_keeps_field_order() {
        let embed = info_card_embed(InfoCard {
            title: "🌙 Night Cycle Information".to_string(),
            color: 0x2B2D31,
            fields: vec![
                InfoField {
                    name: "Current Status".to_string(),
                    value: "🌙 Night Cycle Active".to_string(),
                },
                InfoField {
                    name: "Time Until Next Night".to_string(),
                    value: "2h 20m".to_string(),
                },
            ],
        });
        let json = serde_json::to_value(&embed).expect("serialize embed");
        assert_eq!(json["title"], "🌙 Night Cycle Information");
        assert_eq!(json["fields"][0]["name"], "Current Status");
        assert_eq!(json["fields"][1]["value"], "2h 20m");
        assert_eq!(json["fields"][1]["inline"], false);
    }
}
