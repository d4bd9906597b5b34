use crate::protocol::models::FunctionCall;
use crate::protocol::server_messages::ServerMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    pub text: String,
    pub thought: bool,
}

/// Flattened view of one server message.
///
/// Every field is independent; a single message may carry tool calls, audio
/// and text at the same time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveEvent {
    pub setup_complete: bool,
    pub tool_calls: Vec<FunctionCall>,
    /// Inline audio of the model turn, decoded and concatenated in part order.
    pub audio: Option<Vec<u8>>,
    pub text_parts: Vec<TextPart>,
    pub turn_complete: bool,
    pub interrupted: bool,
    pub cancelled_calls: Vec<String>,
    pub go_away: Option<String>,
}

impl LiveEvent {
    #[must_use]
    pub fn from_server(message: ServerMessage) -> Self {
        let mut event = Self {
            setup_complete: message.setup_complete.is_some(),
            tool_calls: message
                .tool_call
                .map(|batch| batch.function_calls)
                .unwrap_or_default(),
            cancelled_calls: message
                .tool_call_cancellation
                .map(|c| c.ids)
                .unwrap_or_default(),
            go_away: message
                .go_away
                .map(|g| g.time_left.unwrap_or_default()),
            ..Self::default()
        };

        let Some(content) = message.server_content else {
            return event;
        };
        event.turn_complete = content.turn_complete;
        event.interrupted = content.interrupted;

        let mut audio: Option<Vec<u8>> = None;
        for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
            if let Some(blob) = part.inline_data.filter(|b| b.is_audio()) {
                audio.get_or_insert_with(Vec::new).extend_from_slice(&blob.data);
            }
            if let Some(text) = part.text {
                event.text_parts.push(TextPart {
                    text,
                    thought: part.thought,
                });
            }
        }
        event.audio = audio.filter(|bytes| !bytes.is_empty());
        event
    }

    /// Spoken text of this event: non-reasoning parts joined by a single
    /// space and trimmed. `None` when nothing remains.
    #[must_use]
    pub fn transcript(&self) -> Option<String> {
        let joined = self
            .text_parts
            .iter()
            .filter(|part| !part.thought && !part.text.is_empty())
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
