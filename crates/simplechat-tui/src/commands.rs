//! One-shot subcommands that talk to the backend without the terminal UI.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use simplechat_core::{ApiClient, ChatMessage, Config};
use tracing::warn;

use crate::handler::expand_home;

pub async fn health(api: &ApiClient) -> Result<()> {
    let status = api
        .health()
        .await
        .with_context(|| format!("backend at {} is not reachable", api.base_url()))?;
    println!("{}: {}", api.base_url(), status.status);
    Ok(())
}

/// Send a single prompt, streaming the reply to stdout as it arrives.
pub async fn ask(api: &ApiClient, prompt: &str) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("prompt is empty");
    }

    let history = vec![ChatMessage::user(prompt)];
    let mut streamed = false;
    let mut stdout = io::stdout();

    let reply = api
        .ask(&history, |chunk| {
            streamed = true;
            print!("{}", chunk);
            let _ = stdout.flush();
        })
        .await?;

    // JSON replies arrive whole, nothing was printed yet
    if !streamed {
        print!("{}", reply.message.content);
    }
    println!();

    for (idx, tool) in reply.tool_calls.iter().enumerate() {
        let result = tool
            .result_text()
            .unwrap_or_else(|| "(no output)".to_string());
        let name = tool.name.as_deref().unwrap_or("tool");
        println!("\n# Tool call {} ({})\n{}", idx + 1, name, result);
    }

    Ok(())
}

pub async fn login(api: &mut ApiClient, username: &str) -> Result<()> {
    let password = Password::new()
        .with_prompt(format!("Password for {}", username))
        .interact()?;

    let session = api.login(username, &password).await?;
    if let Err(err) = Config::save_username(&session.username) {
        warn!("could not remember username: {}", err);
    }

    println!("Logged in as {}", session.username);
    println!("{}", session.token);
    Ok(())
}

pub async fn create_store(api: &ApiClient, name: &str) -> Result<()> {
    let store = api.create_vector_store(name).await?;
    match store.name.as_deref() {
        Some(name) => println!("{} ({})", store.id, name),
        None => println!("{}", store.id),
    }
    Ok(())
}

pub async fn upload(api: &ApiClient, store: Option<&str>, raw_path: &str) -> Result<()> {
    let store = store.unwrap_or_default();
    let path = expand_home(raw_path);

    let file = api
        .upload_knowledge_file(store, &path)
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;

    println!("✅ Uploaded document: {}", file.filename);
    if let Some(id) = &file.id {
        println!("file id: {} (vector store {})", id, file.vector_store_id);
    }
    Ok(())
}
