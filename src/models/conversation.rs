use crate::models::telegram::TelegramMessage;

/// Per-user step of the registration/recording dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    /// Outside the dialogue; only /start enters it
    #[default]
    Idle,
    /// Waiting for the apartment number
    Register,
    /// Waiting for "<cold> <hot>"
    RecordMeterData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Help,
    Qr,
    Text(String),
}

/// One inbound message, already reduced to what the dialogue needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: String,
    pub chat_id: i64,
    pub first_name: Option<String>,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Maps a Telegram message to an event. Messages without a human sender or
    /// without text, and commands other than /start, /help and /qr, yield None.
    pub fn from_message(message: &TelegramMessage) -> Option<Self> {
        let from = message.from.as_ref().filter(|user| !user.is_bot)?;
        let text = message.text.as_deref()?;

        let kind = match text.strip_prefix('/') {
            Some(command) => {
                let name = command.split_whitespace().next().unwrap_or("");
                let name = name.split('@').next().unwrap_or("");
                match name {
                    "start" => EventKind::Start,
                    "help" => EventKind::Help,
                    "qr" => EventKind::Qr,
                    _ => return None,
                }
            }
            None => EventKind::Text(text.to_string()),
        };

        Some(Self {
            user_id: from.id.to_string(),
            chat_id: message.chat.id,
            first_name: Some(from.first_name.clone()).filter(|n| !n.is_empty()),
            kind,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMarkup {
    #[default]
    None,
    /// Opens the reply box addressed to the user
    ForceReply,
    RemoveKeyboard,
}

impl ReplyMarkup {
    pub fn to_json(self) -> Option<serde_json::Value> {
        match self {
            ReplyMarkup::None => None,
            ReplyMarkup::ForceReply => Some(serde_json::json!({
                "force_reply": true,
                "selective": true,
            })),
            ReplyMarkup::RemoveKeyboard => Some(serde_json::json!({
                "remove_keyboard": true,
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text { text: String, markup: ReplyMarkup },
    Photo { png: Vec<u8>, caption: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            markup: ReplyMarkup::None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: ReplyMarkup) -> Self {
        Reply::Text {
            text: text.into(),
            markup,
        }
    }

    /// Text of the reply (caption for photos)
    pub fn as_text(&self) -> &str {
        match self {
            Reply::Text { text, .. } => text,
            Reply::Photo { caption, .. } => caption,
        }
    }
}

/// Result of one dialogue step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationState,
    pub replies: Vec<Reply>,
}

impl Transition {
    pub fn to(next: ConversationState, replies: Vec<Reply>) -> Self {
        Self { next, replies }
    }
}
