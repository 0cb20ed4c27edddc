// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph API request, response and webhook payload types.

use convoy_core::types::MediaKind;
use convoy_core::MessageContent;
use serde::{Deserialize, Serialize};

// --- Outbound ---

/// Body of `POST /{version}/{phone_number_id}/messages`.
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReplyContext<'a>>,
    #[serde(flatten)]
    pub body: SendBody<'a>,
}

impl<'a> SendRequest<'a> {
    pub fn new(to: &'a str, content: &'a MessageContent, reply_to: Option<&'a str>) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            context: reply_to.map(|message_id| ReplyContext { message_id }),
            body: SendBody::from_content(content),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyContext<'a> {
    pub message_id: &'a str,
}

/// The typed part of a send request, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SendBody<'a> {
    Text { text: TextBody<'a> },
    Image { image: MediaBody<'a> },
    Video { video: MediaBody<'a> },
    Audio { audio: MediaBody<'a> },
    Document { document: MediaBody<'a> },
    Sticker { sticker: MediaBody<'a> },
    Location { location: LocationBody<'a> },
    Contacts { contacts: Vec<ContactCard<'a>> },
    Template { template: TemplateBody<'a> },
}

impl<'a> SendBody<'a> {
    fn from_content(content: &'a MessageContent) -> Self {
        match content {
            MessageContent::Text { body } => SendBody::Text {
                text: TextBody {
                    body,
                    preview_url: false,
                },
            },
            MessageContent::Media { kind, url, caption } => {
                // Audio and stickers do not accept captions.
                let caption = match kind {
                    MediaKind::Audio | MediaKind::Sticker => None,
                    _ => caption.as_deref(),
                };
                let media = MediaBody { link: url, caption };
                match kind {
                    MediaKind::Image => SendBody::Image { image: media },
                    MediaKind::Video => SendBody::Video { video: media },
                    MediaKind::Audio => SendBody::Audio { audio: media },
                    MediaKind::Document => SendBody::Document { document: media },
                    MediaKind::Sticker => SendBody::Sticker { sticker: media },
                }
            }
            MessageContent::Location {
                latitude,
                longitude,
                name,
            } => SendBody::Location {
                location: LocationBody {
                    latitude: *latitude,
                    longitude: *longitude,
                    name: name.as_deref(),
                },
            },
            MessageContent::Contact { name, phone } => SendBody::Contacts {
                contacts: vec![ContactCard {
                    name: ContactName {
                        formatted_name: name,
                        first_name: name,
                    },
                    phones: vec![ContactPhone {
                        phone,
                        kind: "CELL",
                    }],
                }],
            },
            MessageContent::Template {
                name,
                language,
                parameters,
            } => {
                let components = if parameters.is_empty() {
                    Vec::new()
                } else {
                    vec![TemplateComponent {
                        kind: "body",
                        parameters: parameters
                            .values()
                            .map(|text| TemplateParameter { kind: "text", text })
                            .collect(),
                    }]
                };
                SendBody::Template {
                    template: TemplateBody {
                        name,
                        language: TemplateLanguage { code: language },
                        components,
                    },
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TextBody<'a> {
    pub body: &'a str,
    pub preview_url: bool,
}

#[derive(Debug, Serialize)]
pub struct MediaBody<'a> {
    pub link: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct LocationBody<'a> {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ContactCard<'a> {
    pub name: ContactName<'a>,
    pub phones: Vec<ContactPhone<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ContactName<'a> {
    pub formatted_name: &'a str,
    pub first_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ContactPhone<'a> {
    pub phone: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TemplateBody<'a> {
    pub name: &'a str,
    pub language: TemplateLanguage<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<TemplateComponent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateLanguage<'a> {
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TemplateComponent<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub parameters: Vec<TemplateParameter<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateParameter<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

/// Successful send response.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentId>,
}

#[derive(Debug, Deserialize)]
pub struct SentId {
    pub id: String,
}

/// Error envelope returned with non-2xx answers.
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_subcode: Option<i64>,
}

// --- Webhooks ---

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<ChangeMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<WebhookStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeMetadata {
    pub phone_number_id: String,
    #[serde(default)]
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    /// Unix seconds, as a string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub context: Option<MessageContext>,
    #[serde(default)]
    pub text: Option<InboundText>,
    #[serde(default)]
    pub image: Option<InboundMedia>,
    #[serde(default)]
    pub video: Option<InboundMedia>,
    #[serde(default)]
    pub audio: Option<InboundMedia>,
    #[serde(default)]
    pub document: Option<InboundMedia>,
    #[serde(default)]
    pub sticker: Option<InboundMedia>,
    #[serde(default)]
    pub location: Option<InboundLocation>,
    #[serde(default)]
    pub contacts: Option<Vec<InboundContact>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageContext {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundText {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMedia {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboundLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboundContact {
    pub name: InboundContactName,
    #[serde(default)]
    pub phones: Vec<InboundContactPhone>,
}

#[derive(Debug, Deserialize)]
pub struct InboundContactName {
    pub formatted_name: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundContactPhone {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookStatus {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<StatusError>,
}

#[derive(Debug, Deserialize)]
pub struct StatusError {
    pub code: i64,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn text_request_shape() {
        let content = MessageContent::text("Load at dock 4");
        let request = SendRequest::new("447700900001", &content, Some("wamid.prev"));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["messaging_product"], "whatsapp");
        assert_eq!(json["to"], "447700900001");
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"]["body"], "Load at dock 4");
        assert_eq!(json["context"]["message_id"], "wamid.prev");
    }

    #[test]
    fn template_parameters_follow_key_order() {
        let mut parameters = BTreeMap::new();
        parameters.insert("1".to_string(), "Ann".to_string());
        parameters.insert("2".to_string(), "09:00".to_string());
        let content = MessageContent::Template {
            name: "shift_reminder".to_string(),
            language: "en_GB".to_string(),
            parameters,
        };
        let json = serde_json::to_value(SendRequest::new("447700900001", &content, None)).unwrap();

        assert_eq!(json["type"], "template");
        assert_eq!(json["template"]["language"]["code"], "en_GB");
        let params = &json["template"]["components"][0]["parameters"];
        assert_eq!(params[0]["text"], "Ann");
        assert_eq!(params[1]["text"], "09:00");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn audio_drops_caption() {
        let content = MessageContent::Media {
            kind: MediaKind::Audio,
            url: "https://cdn.example/voice.ogg".to_string(),
            caption: Some("ignored".to_string()),
        };
        let json = serde_json::to_value(SendRequest::new("447700900001", &content, None)).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["audio"]["link"], "https://cdn.example/voice.ogg");
        assert!(json["audio"].get("caption").is_none());
    }
}
