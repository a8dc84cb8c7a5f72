use std::cmp::min;

use simplechat_core::chat::{greeting_for, GREETING};
use simplechat_core::{ApiClient, Config, Conversation, Session};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    pub error: Option<String>,
    pub submitting: bool,
}

impl LoginForm {
    pub fn active_input(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    /// Validate the form, returning trimmed credentials.
    pub fn credentials(&self) -> Result<(String, String), String> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err("Username is required".to_string());
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        Ok((username.to_string(), self.password.clone()))
    }
}

/// Knowledge-base upload prompt and its outcome
#[derive(Debug, Default)]
pub struct UploadState {
    pub prompt_open: bool,
    pub path_input: String,
    pub uploading: bool,
    pub feedback: Option<String>,
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,

    // Backend
    pub api: ApiClient,
    pub config: Config,
    pub status: String,
    pub username: Option<String>,

    // Chat state
    pub conversation: Conversation,
    pub input: String,
    pub input_cursor: usize,

    // Transcript scrolling
    pub scroll: u16,
    pub chat_max_scroll: u16,
    pub auto_scroll: bool,

    pub login: LoginForm,
    pub upload: UploadState,

    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: Config) -> Self {
        let api = ApiClient::new(&config.api_base);

        let screen = if config.skip_login {
            Screen::Chat
        } else {
            Screen::Login
        };

        let login = LoginForm {
            username: config.username.clone().unwrap_or_default(),
            field: if config.username.is_some() {
                LoginField::Password
            } else {
                LoginField::Username
            },
            ..LoginForm::default()
        };

        Self {
            should_quit: false,
            screen,
            api,
            config,
            status: "checking...".to_string(),
            username: None,
            conversation: Conversation::with_greeting(GREETING),
            input: String::new(),
            input_cursor: 0,
            scroll: 0,
            chat_max_scroll: 0,
            // Stays off until the transcript first changes
            auto_scroll: false,
            login,
            upload: UploadState::default(),
            animation_frame: 0,
        }
    }

    pub fn set_health(&mut self, result: Result<String, String>) {
        self.status = match result {
            Ok(status) => status,
            Err(err) => {
                warn!("health check failed: {}", err);
                "error".to_string()
            }
        };
    }

    /// Switch to the chat screen for a freshly logged in user.
    pub fn start_session(&mut self, session: Session) {
        self.api.set_token(Some(session.token));
        self.conversation = Conversation::with_greeting(greeting_for(&session.username));
        self.username = Some(session.username);
        self.login = LoginForm::default();
        self.screen = Screen::Chat;
        self.scroll = 0;
        self.auto_scroll = false;
    }

    pub fn can_submit(&self) -> bool {
        self.conversation.can_submit(&self.input)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_loading() || self.upload.uploading || self.login.submitting {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = min(self.scroll.saturating_add(lines), self.chat_max_scroll);
        if self.scroll >= self.chat_max_scroll {
            self.auto_scroll = true;
        }
    }

    /// Pin the transcript to the bottom; called whenever messages change.
    pub fn enable_auto_scroll(&mut self) {
        self.auto_scroll = true;
        self.scroll = self.chat_max_scroll;
    }

    /// Update scroll bounds after layout changes.
    pub fn update_scroll_bounds(&mut self, max_scroll: u16) {
        self.chat_max_scroll = max_scroll;
        if self.auto_scroll {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    // Input editing, cursor is a char index

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert_str(byte_pos, text);
        self.input_cursor += text.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    pub fn take_input(&mut self) -> String {
        self.input_cursor = 0;
        std::mem::take(&mut self.input)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
