use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use simplechat_core::{ApiClient, ChatMessage, Config};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::app::{App, Screen};
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;
const PAGE_SCROLL_LINES: u16 = 10;

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Health(result) => app.set_health(result),
        AppEvent::AskChunk(chunk) => {
            app.conversation.apply_chunk(&chunk);
            if app.auto_scroll {
                app.enable_auto_scroll();
            }
        }
        AppEvent::AskDone(result) => {
            match result {
                Ok(reply) => {
                    info!("reply received (tool_calls={})", reply.tool_calls.len());
                    app.conversation.finish_turn(reply);
                }
                Err(err) => {
                    error!("ask failed: {}", err);
                    app.conversation.fail_turn(err);
                }
            }
            if app.auto_scroll {
                app.enable_auto_scroll();
            }
        }
        AppEvent::LoginDone(result) => {
            app.login.submitting = false;
            match result {
                Ok(session) => {
                    if let Err(err) = Config::save_username(&session.username) {
                        warn!("could not remember username: {}", err);
                    }
                    app.start_session(session);
                }
                Err(err) => {
                    warn!("login failed: {}", err);
                    app.login.password.clear();
                    app.login.error = Some(err);
                }
            }
        }
        AppEvent::UploadDone(result) => {
            app.upload.uploading = false;
            app.upload.feedback = Some(match result {
                Ok(file) => format!("✅ Uploaded document: {}", file.filename),
                Err(err) => {
                    error!("upload failed: {}", err);
                    format!("⚠ {}", err)
                }
            });
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.screen {
        Screen::Login => handle_login_key(app, key, tx),
        Screen::Chat => handle_chat_key(app, key, tx),
    }
}

/// Ctrl or Alt chords are shortcuts, not text. Ctrl+Alt together is how
/// AltGr characters arrive on some platforms, so those still type.
fn has_command_modifier(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) != key.modifiers.contains(KeyModifiers::ALT)
}

fn handle_login_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    if app.login.submitting {
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => app.login.toggle_field(),
        KeyCode::Enter => match app.login.credentials() {
            Ok((username, password)) => {
                app.login.error = None;
                app.login.submitting = true;
                spawn_login(app.api.clone(), username, password, tx.clone());
            }
            Err(message) => app.login.error = Some(message),
        },
        KeyCode::Backspace => {
            app.login.active_input().pop();
        }
        KeyCode::Char(c) if !has_command_modifier(&key) => {
            app.login.active_input().push(c);
        }
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    if app.upload.prompt_open {
        handle_upload_prompt_key(app, key, tx);
        return;
    }

    // Scrolling and overlays work while a reply is streaming
    match key.code {
        KeyCode::PageUp => {
            app.scroll_up(PAGE_SCROLL_LINES);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(PAGE_SCROLL_LINES);
            return;
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !app.upload.uploading {
                app.upload.prompt_open = true;
                app.upload.feedback = None;
            }
            return;
        }
        KeyCode::Esc => {
            if app.upload.feedback.take().is_none() {
                app.conversation.clear_error();
            }
            return;
        }
        _ => {}
    }

    // Input is disabled while waiting for a reply
    if app.conversation.is_loading() {
        return;
    }

    match key.code {
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_char('\n');
        }
        KeyCode::Enter => submit(app, tx),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !has_command_modifier(&key) => app.insert_char(c),
        _ => {}
    }
}

fn handle_upload_prompt_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => {
            app.upload.prompt_open = false;
            app.upload.path_input.clear();
        }
        KeyCode::Enter => {
            let raw = std::mem::take(&mut app.upload.path_input);
            app.upload.prompt_open = false;
            start_upload(app, raw.trim(), tx);
        }
        KeyCode::Backspace => {
            app.upload.path_input.pop();
        }
        KeyCode::Char(c) if !has_command_modifier(&key) => app.upload.path_input.push(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    match app.screen {
        Screen::Login => {
            if !app.login.submitting {
                app.login.active_input().push_str(text.trim_end_matches('\n'));
            }
        }
        Screen::Chat if app.upload.prompt_open => {
            app.upload.path_input.push_str(text.trim());
        }
        Screen::Chat if !app.conversation.is_loading() => app.insert_str(&text),
        Screen::Chat => {}
    }
}

/// Start a chat turn. A no-op while the input is blank or a reply is pending.
fn submit(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    if !app.can_submit() {
        return;
    }
    let input = app.take_input();
    if let Some(history) = app.conversation.begin_turn(&input) {
        app.enable_auto_scroll();
        spawn_ask(app.api.clone(), history, tx.clone());
    }
}

fn start_upload(app: &mut App, raw_path: &str, tx: &UnboundedSender<AppEvent>) {
    if raw_path.is_empty() {
        return;
    }

    let Some(store_id) = app.config.vector_store_id.clone() else {
        app.upload.feedback = Some("⚠ vector store id not configured".to_string());
        return;
    };

    app.upload.uploading = true;
    app.upload.feedback = None;
    spawn_upload(app.api.clone(), store_id, expand_home(raw_path), tx.clone());
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

pub fn spawn_health_check(api: ApiClient, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let result = api
            .health()
            .await
            .map(|health| health.status)
            .map_err(|err| err.to_string());
        let _ = tx.send(AppEvent::Health(result));
    });
}

fn spawn_ask(api: ApiClient, history: Vec<ChatMessage>, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let chunk_tx = tx.clone();
        let result = api
            .ask(&history, |chunk| {
                let _ = chunk_tx.send(AppEvent::AskChunk(chunk.to_string()));
            })
            .await
            .map_err(|err| err.to_string());
        let _ = tx.send(AppEvent::AskDone(result));
    });
}

fn spawn_login(mut api: ApiClient, username: String, password: String, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let result = api
            .login(&username, &password)
            .await
            .map_err(|err| err.to_string());
        let _ = tx.send(AppEvent::LoginDone(result));
    });
}

fn spawn_upload(api: ApiClient, store_id: String, path: PathBuf, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let result = api
            .upload_knowledge_file(&store_id, &path)
            .await
            .map_err(|err| err.to_string());
        let _ = tx.send(AppEvent::UploadDone(result));
    });
}
