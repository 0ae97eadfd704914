//! Conversation management CLI commands.

use crate::config::Config;
use crate::session::Conversation;
use crate::storage::{Storage, StorageConfig};
use anyhow::Result;

async fn open_storage() -> Result<Storage> {
    let config = Config::load().await?;
    Ok(Storage::new(StorageConfig::from_settings(&config.storage)))
}

/// List all stored conversations
pub async fn list() -> Result<()> {
    let storage = open_storage().await?;
    let keys = storage.list(&["conversations"]).await?;

    if keys.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    println!("{:<32} {:<40} {:<20}", "ID", "Title", "Updated");
    println!("{}", "-".repeat(92));

    for key in keys {
        let id = &key[1];
        let Some(conversation) = storage.read::<Conversation>(&["conversations", id]).await? else {
            continue;
        };

        let title = if conversation.title.chars().count() > 38 {
            let truncated: String = conversation.title.chars().take(35).collect();
            format!("{}...", truncated)
        } else {
            conversation.title.clone()
        };

        println!(
            "{:<32} {:<40} {:<20}",
            conversation.id,
            title,
            conversation.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

/// Show conversation details
pub async fn show(id: &str) -> Result<()> {
    let storage = open_storage().await?;
    let conversation = storage
        .read::<Conversation>(&["conversations", id])
        .await?
        .ok_or_else(|| anyhow::anyhow!("Conversation not found: {}", id))?;

    println!("Conversation: {}", conversation.id);
    println!("Title: {}", conversation.title);
    println!("Model: {}", conversation.config.model);
    println!(
        "Created: {}",
        conversation.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "Updated: {}",
        conversation.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("\nMessages: {}", conversation.messages.len());

    for message in &conversation.messages {
        println!("\n[{}]", message.role.as_str());
        println!("{}", message.content);
    }

    Ok(())
}

/// Delete a conversation
pub async fn delete(id: &str) -> Result<()> {
    let storage = open_storage().await?;
    let conversation = storage
        .read::<Conversation>(&["conversations", id])
        .await?
        .ok_or_else(|| anyhow::anyhow!("Conversation not found: {}", id))?;

    println!("Deleting conversation: {} ({})", conversation.title, conversation.id);
    storage.remove(&["conversations", id]).await?;
    println!("Conversation deleted.");

    Ok(())
}
