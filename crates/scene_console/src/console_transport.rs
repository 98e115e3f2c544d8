//! Terminal transport
//!
//! Prints every rendered message with numbered buttons and remembers what each
//! user currently sees, so a typed number can be turned back into a tap.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use scene_core::{InlineButton, Keyboard, MessageId, Transport, TransportError, UserId};

#[derive(Debug, Clone)]
struct Shown {
    user_id: UserId,
    text: String,
    image: Option<String>,
    keyboard: Option<Keyboard>,
}

#[derive(Debug, Default)]
struct Screen {
    messages: HashMap<MessageId, Shown>,
    /// Last message rendered for each user.
    current: HashMap<UserId, MessageId>,
}

pub struct ConsoleTransport {
    screen: Mutex<Screen>,
    next_id: AtomicI64,
    show_callbacks: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleTransport {
    pub fn new(show_callbacks: bool) -> Arc<Self> {
        Self::with_writer(show_callbacks, Box::new(std::io::stdout()))
    }

    pub fn with_writer(show_callbacks: bool, out: Box<dyn Write + Send>) -> Arc<Self> {
        Arc::new(Self {
            screen: Mutex::new(Screen::default()),
            next_id: AtomicI64::new(1),
            show_callbacks,
            out: Mutex::new(out),
        })
    }

    fn screen(&self) -> Result<MutexGuard<'_, Screen>, TransportError> {
        self.screen
            .lock()
            .map_err(|_| TransportError::Request("console state poisoned".to_string()))
    }

    /// Button number `index` (1-based) of the message `user_id` currently sees.
    pub fn button(&self, user_id: UserId, index: usize) -> Option<(MessageId, InlineButton)> {
        let screen = self.screen.lock().ok()?;
        let message_id = *screen.current.get(&user_id)?;
        let keyboard = screen.messages.get(&message_id)?.keyboard.as_ref()?;
        let button = keyboard.buttons().nth(index.checked_sub(1)?)?.clone();
        Some((message_id, button))
    }

    pub fn current_message(&self, user_id: UserId) -> Option<MessageId> {
        self.screen.lock().ok()?.current.get(&user_id).copied()
    }

    fn print(&self, header: &str, shown: &Shown) {
        let mut block = format!("── {} (user {}) ──\n", header, shown.user_id);
        if let Some(image) = &shown.image {
            block.push_str(&format!("[image: {}]\n", image));
        }
        block.push_str(&shown.text);
        block.push('\n');

        if let Some(keyboard) = &shown.keyboard {
            let mut number = 0;
            for row in &keyboard.rows {
                let cells: Vec<String> = row
                    .iter()
                    .map(|button| {
                        number += 1;
                        if self.show_callbacks {
                            format!("[{}] {} <{}>", number, button.label, button.data)
                        } else {
                            format!("[{}] {}", number, button.label)
                        }
                    })
                    .collect();
                block.push_str(&cells.join("   "));
                block.push('\n');
            }
        }
        self.write(&block);
    }

    fn write(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", text);
            let _ = out.flush();
        }
    }

    fn show(
        &self,
        user_id: UserId,
        text: &str,
        image: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let shown = Shown {
            user_id,
            text: text.to_string(),
            image: image.map(str::to_string),
            keyboard: keyboard.cloned(),
        };
        {
            let mut screen = self.screen()?;
            screen.messages.insert(message_id, shown.clone());
            screen.current.insert(user_id, message_id);
        }
        self.print(&format!("message #{}", message_id), &shown);
        Ok(message_id)
    }

    fn edit(
        &self,
        message_id: MessageId,
        text: &str,
        image: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let shown = {
            let mut screen = self.screen()?;
            let shown = screen
                .messages
                .get_mut(&message_id)
                .ok_or(TransportError::MessageNotFound(message_id))?;
            if shown.image.is_some() != image.is_some() {
                return Err(TransportError::KindMismatch(message_id));
            }
            shown.text = text.to_string();
            shown.image = image.map(str::to_string);
            shown.keyboard = keyboard.cloned();
            let shown = shown.clone();
            screen.current.insert(shown.user_id, message_id);
            shown
        };
        self.print(&format!("message #{} edited", message_id), &shown);
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(
        &self,
        user_id: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        self.show(user_id, text, None, keyboard)
    }

    async fn edit_text(
        &self,
        _chat_id: UserId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.edit(message_id, text, None, keyboard)
    }

    async fn send_photo(
        &self,
        user_id: UserId,
        image: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        self.show(user_id, caption, Some(image), keyboard)
    }

    async fn edit_photo(
        &self,
        _chat_id: UserId,
        message_id: MessageId,
        image: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.edit(message_id, caption, Some(image), keyboard)
    }

    async fn delete_message(
        &self,
        chat_id: UserId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        {
            let mut screen = self.screen()?;
            screen
                .messages
                .remove(&message_id)
                .ok_or(TransportError::MessageNotFound(message_id))?;
            if screen.current.get(&chat_id) == Some(&message_id) {
                screen.current.remove(&chat_id);
            }
        }
        self.write(&format!("── message #{} deleted ──", message_id));
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        if let Some(text) = text {
            self.write(&format!("(notice) {}", text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_core::{layout, ButtonSpec};

    fn quiet() -> Arc<ConsoleTransport> {
        ConsoleTransport::with_writer(false, Box::new(std::io::sink()))
    }

    fn keyboard() -> Keyboard {
        layout(
            &[
                ButtonSpec::new("A", "demo:a"),
                ButtonSpec::new("B", "demo:b"),
                ButtonSpec::new("C", "demo:c").alone(),
            ],
            2,
        )
    }

    #[tokio::test]
    async fn numbers_buttons_across_rows() {
        let transport = quiet();
        let id = transport.send_text(1, "hi", Some(&keyboard())).await.unwrap();

        let (message_id, button) = transport.button(1, 3).unwrap();
        assert_eq!(message_id, id);
        assert_eq!(button.data, "demo:c");
        assert!(transport.button(1, 0).is_none());
        assert!(transport.button(1, 4).is_none());
        assert!(transport.button(2, 1).is_none());
    }

    #[tokio::test]
    async fn edit_rejects_kind_change_and_missing_messages() {
        let transport = quiet();
        let id = transport.send_photo(1, "map.png", "Map", None).await.unwrap();

        assert_eq!(
            transport.edit_text(1, id, "text", None).await,
            Err(TransportError::KindMismatch(id))
        );
        transport.edit_photo(1, id, "map.png", "Map 2", None).await.unwrap();

        transport.delete_message(1, id).await.unwrap();
        assert_eq!(
            transport.edit_photo(1, id, "map.png", "Map 3", None).await,
            Err(TransportError::MessageNotFound(id))
        );
        assert_eq!(transport.current_message(1), None);
    }
}
