// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier newtypes and value enums shared by the engine and its collaborators.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Tenant (team) identifier.
    TeamId
);
id_type!(
    /// Conversation identifier.
    ConversationId
);
id_type!(
    /// Message identifier.
    MessageId
);
id_type!(
    /// Per-destination delivery record identifier.
    RecipientId
);
id_type!(
    /// Reaction identifier.
    ReactionId
);
id_type!(
    /// Driver (individual counterpart) identifier.
    DriverId
);
id_type!(
    /// Group identifier.
    GroupId
);
id_type!(
    /// Group participant identifier. Ascending ids follow join order.
    ParticipantId
);
id_type!(
    /// Staff user identifier.
    UserId
);

/// Whether a conversation is one-to-one with a driver or a group fan-out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationKind {
    Individual,
    Group,
}

/// Delivery lifecycle status.
///
/// Variants are declared from least to most progressed, so the derived `Ord`
/// is the aggregation order: a message's displayed status is the minimum over
/// its recipients.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageStatus {
    /// Terminal failure: budget exhausted, permanent error, or abandoned.
    FailedExhausted,
    /// Retryable failure awaiting the scheduler.
    Failed,
    Pending,
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// `Read` and `FailedExhausted` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Read | MessageStatus::FailedExhausted)
    }

    /// Whether a provider attempt is still owed for this status.
    pub fn awaits_dispatch(self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Failed)
    }

    /// Whether the provider has accepted the message (Sent or further along).
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Delivered | MessageStatus::Read
        )
    }

    /// Legal single-step transitions of the delivery state machine.
    ///
    /// Forward moves along Pending -> Sent -> Delivered -> Read may skip steps
    /// (out-of-order acknowledgements are backfilled by the caller).
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        match (self, next) {
            (Pending, Sent | Delivered | Read) => true,
            (Sent, Delivered | Read) => true,
            (Delivered, Read) => true,
            (Pending | Sent, Failed | FailedExhausted) => true,
            (Failed, Pending | FailedExhausted) => true,
            _ => false,
        }
    }

    /// Aggregate status across recipients. An empty set counts as `Sent`.
    pub fn aggregate<I>(statuses: I) -> MessageStatus
    where
        I: IntoIterator<Item = MessageStatus>,
    {
        statuses.into_iter().min().unwrap_or(MessageStatus::Sent)
    }
}

/// Whether a message came from the counterpart or from staff.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Sender {
    Staff(UserId),
    Driver(DriverId),
    Participant(ParticipantId),
}

impl Sender {
    pub fn is_staff(&self) -> bool {
        matches!(self, Sender::Staff(_))
    }

    pub fn direction(&self) -> Direction {
        match self {
            Sender::Staff(_) => Direction::Outbound,
            Sender::Driver(_) | Sender::Participant(_) => Direction::Inbound,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Staff(id) => write!(f, "staff:{id}"),
            Sender::Driver(id) => write!(f, "driver:{id}"),
            Sender::Participant(id) => write!(f, "participant:{id}"),
        }
    }
}

/// Author of a reaction. A reactor holds at most one reaction per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Reactor {
    Staff(UserId),
    Driver(DriverId),
}

/// Media attachment categories accepted by the provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// Message payload.
///
/// Only [`MessageContent::Template`] may be sent outside the session window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Media {
        kind: MediaKind,
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        name: Option<String>,
    },
    Contact {
        name: String,
        phone: String,
    },
    Template {
        name: String,
        language: String,
        /// Positional or named body parameters, sent in key order.
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        MessageContent::Text { body: body.into() }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, MessageContent::Template { .. })
    }

    /// Short type tag, matching the serialized `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Media { .. } => "media",
            MessageContent::Location { .. } => "location",
            MessageContent::Contact { .. } => "contact",
            MessageContent::Template { .. } => "template",
        }
    }

    /// Single-line human readable summary, used for reply snapshots.
    pub fn preview(&self) -> String {
        match self {
            MessageContent::Text { body } => body.clone(),
            MessageContent::Media { kind, caption, .. } => match caption {
                Some(c) if !c.is_empty() => format!("[{kind}] {c}"),
                _ => format!("[{kind}]"),
            },
            MessageContent::Location {
                latitude,
                longitude,
                name,
            } => match name {
                Some(n) => format!("[location] {n}"),
                None => format!("[location] {latitude:.5},{longitude:.5}"),
            },
            MessageContent::Contact { name, .. } => format!("[contact] {name}"),
            MessageContent::Template { name, .. } => format!("[template] {name}"),
        }
    }
}

/// Role of a participant inside a group.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantRole {
    #[default]
    Member,
    Admin,
}

/// What a group participant row points at: a known driver or a raw contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantTarget {
    Driver { driver_id: DriverId },
    Contact { phone: String, name: Option<String> },
}

/// A concrete destination produced by recipient resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Driver {
        driver_id: DriverId,
        phone: String,
    },
    Participant {
        participant_id: ParticipantId,
        phone: String,
        name: Option<String>,
    },
}

impl Destination {
    pub fn phone(&self) -> &str {
        match self {
            Destination::Driver { phone, .. } | Destination::Participant { phone, .. } => phone,
        }
    }

    pub fn target(&self) -> RecipientTarget {
        match self {
            Destination::Driver { driver_id, .. } => RecipientTarget::Driver(*driver_id),
            Destination::Participant { participant_id, .. } => {
                RecipientTarget::Participant(*participant_id)
            }
        }
    }
}

/// Identity of a recipient row's destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecipientTarget {
    Driver(DriverId),
    Participant(ParticipantId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_order_is_progress_order() {
        use MessageStatus::*;
        let mut all = vec![Read, Pending, FailedExhausted, Delivered, Sent, Failed];
        all.sort();
        assert_eq!(all, vec![FailedExhausted, Failed, Pending, Sent, Delivered, Read]);
    }

    #[test]
    fn aggregate_is_least_progressed() {
        use MessageStatus::*;
        assert_eq!(MessageStatus::aggregate([Read, Delivered, Read]), Delivered);
        assert_eq!(MessageStatus::aggregate([Read, Read]), Read);
        assert_eq!(MessageStatus::aggregate([Read, Failed, Sent]), Failed);
        assert_eq!(MessageStatus::aggregate(Vec::new()), Sent);
    }

    #[test]
    fn transitions_only_move_forward() {
        use MessageStatus::*;
        assert!(Pending.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Read));
        assert!(Failed.can_transition_to(Pending));
        assert!(!Read.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Sent));
        assert!(!Delivered.can_transition_to(Failed));
        assert!(!FailedExhausted.can_transition_to(Pending));
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            MessageStatus::FailedExhausted,
            MessageStatus::Failed,
            MessageStatus::Pending,
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            let s = status.to_string();
            assert_eq!(MessageStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(MessageStatus::FailedExhausted.to_string(), "failed_exhausted");
    }

    #[test]
    fn only_templates_are_templates() {
        assert!(!MessageContent::text("hi").is_template());
        let template = MessageContent::Template {
            name: "shift_reminder".into(),
            language: "en".into(),
            parameters: BTreeMap::new(),
        };
        assert!(template.is_template());
        assert_eq!(template.preview(), "[template] shift_reminder");
    }

    #[test]
    fn content_serializes_with_type_tag() {
        let json = serde_json::to_value(MessageContent::text("hello")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["body"], "hello");
    }

    #[test]
    fn media_preview_includes_caption() {
        let media = MessageContent::Media {
            kind: MediaKind::Image,
            url: "https://cdn.example/1.jpg".into(),
            caption: Some("delivery proof".into()),
        };
        assert_eq!(media.preview(), "[image] delivery proof");
    }

    #[test]
    fn sender_direction() {
        assert_eq!(Sender::Staff(UserId(1)).direction(), Direction::Outbound);
        assert_eq!(Sender::Driver(DriverId(1)).direction(), Direction::Inbound);
        assert_eq!(
            Sender::Participant(ParticipantId(1)).direction(),
            Direction::Inbound
        );
    }
}
