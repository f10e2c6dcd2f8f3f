use crate::{util::truncate, ChatMessage, CollabEvent, UserData};

use super::Room;

impl Room {
    /// Posts a chat message. Blank messages are dropped and long ones cut short.
    pub fn send_message(&self, user: &UserData, text: &str) {
        let text = text.trim();

        if text.is_empty() {
            return;
        }

        let state = self.state.lock();

        if !state.is_listener(user.id) {
            return;
        }

        let text = truncate(text, self.context.config.max_message_length);

        self.emit(
            &state,
            CollabEvent::NewChatMessage(ChatMessage {
                user: Some(user.clone()),
                text,
                system: false,
            }),
        );
    }
}
