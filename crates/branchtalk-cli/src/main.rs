//! Branchtalk CLI
//!
//! Inspect and extend branching conversations stored in a JSON snapshot.

mod snapshot;

use anyhow::{bail, Context, Result};
use branchtalk_context::{
    flatten, ConversationManager, MemoryMessageStore, MessageStore, TreeRenderer,
};
use branchtalk_core::{EngineConfig, Role, TreeSession};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "branchtalk")]
#[command(about = "Branchtalk - branching conversation trees")]
#[command(version)]
struct Cli {
    /// Snapshot file holding the messages
    #[arg(short, long, default_value = "conversation.json")]
    file: PathBuf,

    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Conversation to operate on (default: the only one in the snapshot)
    #[arg(short = 'C', long)]
    conversation: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the conversation tree
    Tree {
        /// Highlight the path to this message
        #[arg(long)]
        active: Option<String>,
    },

    /// Print the root-to-message path
    Path { id: String },

    /// List branch heads (messages without replies)
    Leaves,

    /// Print the model context ending at a message
    Context {
        id: String,

        /// Emit {role, content} JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the flattened tree as JSON
    Flat {
        /// Mark the path to this message
        #[arg(long)]
        active: Option<String>,
    },

    /// Start a new conversation
    New {
        /// Root system prompt
        #[arg(long)]
        system: Option<String>,
    },

    /// Reply to a message
    Reply {
        /// Parent message ID
        parent: String,

        /// Author role (user, assistant, system)
        #[arg(long, default_value = "user")]
        role: Role,

        content: String,
    },

    /// Replace a message's content
    Edit { id: String, content: String },

    /// List conversations, newest first
    List,

    /// Set the conversation title (omit to clear it)
    Rename { title: Option<String> },

    /// Delete the conversation and all of its messages
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load(),
    };

    // Logging goes to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli, config).await
}

async fn run(cli: Cli, config: EngineConfig) -> Result<()> {
    let store = Arc::new(snapshot::load(&cli.file).await?);
    let manager = ConversationManager::new(store.clone(), &config);

    match cli.command {
        Commands::Tree { active } => {
            let conversation =
                resolve_conversation(&store, cli.conversation, active.as_deref()).await?;
            let session = manager.session(&conversation).await?;
            let renderer = TreeRenderer::from_config(&config);
            print!("{}", renderer.render(&session, active.as_deref()));
            report_anomalies(&session);
        }
        Commands::Path { id } => {
            let conversation =
                resolve_conversation(&store, cli.conversation, Some(id.as_str())).await?;
            let session = manager.session(&conversation).await?;
            let path = session.path_to_node(&id);
            if path.is_empty() {
                bail!("Message {} is not in conversation {}", id, conversation);
            }
            for node in path {
                println!("{}  {}", node.message.id, node.message.role);
            }
        }
        Commands::Leaves => {
            let conversation = resolve_conversation(&store, cli.conversation, None).await?;
            let session = manager.session(&conversation).await?;
            for leaf in session.leaf_nodes() {
                println!("{}  depth {}", leaf.message.id, leaf.message.depth);
            }
        }
        Commands::Context { id, json } => {
            if json {
                let turns = manager.model_context(&id).await?;
                println!("{}", serde_json::to_string_pretty(&turns)?);
            } else {
                for message in manager.context(&id).await? {
                    println!("[{}] {}", message.role, message.content);
                }
            }
        }
        Commands::Flat { active } => {
            let conversation =
                resolve_conversation(&store, cli.conversation, active.as_deref()).await?;
            let session = manager.session(&conversation).await?;
            let flat = flatten(&session, active.as_deref());
            println!("{}", serde_json::to_string_pretty(&flat)?);
        }
        Commands::New { system } => {
            let created = manager.create_conversation(system).await?;
            snapshot::save(&cli.file, &store).await?;
            println!("✓ Conversation {}", created.conversation_id);
            println!("  root message: {}", created.root_message_id);
        }
        Commands::Reply {
            parent,
            role,
            content,
        } => {
            let parent_message = store
                .fetch_message(&parent)
                .await?
                .with_context(|| format!("Parent message {} not found", parent))?;
            let message = manager
                .append_message(&parent_message.conversation_id, &parent, role, &content)
                .await?;
            snapshot::save(&cli.file, &store).await?;
            println!("✓ {}", message.id);
        }
        Commands::Edit { id, content } => {
            let message = manager.update_content(&id, &content).await?;
            snapshot::save(&cli.file, &store).await?;
            println!("✓ Updated {}", message.id);
        }
        Commands::List => {
            for conversation in manager.list_conversations().await? {
                println!(
                    "{}  {}  {} messages  {}",
                    conversation.id,
                    conversation.created_at.format("%Y-%m-%d %H:%M"),
                    conversation.message_count,
                    conversation.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        Commands::Rename { title } => {
            let conversation = resolve_conversation(&store, cli.conversation, None).await?;
            let summary = manager
                .rename_conversation(&conversation, title.as_deref())
                .await?;
            snapshot::save(&cli.file, &store).await?;
            println!(
                "✓ {} is now {}",
                summary.id,
                summary.title.as_deref().unwrap_or("(untitled)")
            );
        }
        Commands::Delete => {
            let conversation = resolve_conversation(&store, cli.conversation, None).await?;
            let removed = manager.delete_conversation(&conversation).await?;
            snapshot::save(&cli.file, &store).await?;
            println!("✓ Deleted {} ({} messages)", conversation, removed);
        }
    }

    Ok(())
}

/// Pick the conversation to operate on.
///
/// An explicit ID wins, then the conversation owning `message_id`, then the
/// snapshot's only conversation.
async fn resolve_conversation(
    store: &MemoryMessageStore,
    explicit: Option<String>,
    message_id: Option<&str>,
) -> Result<String> {
    if let Some(conversation) = explicit {
        return Ok(conversation);
    }

    if let Some(id) = message_id {
        if let Some(message) = store.fetch_message(id).await? {
            return Ok(message.conversation_id);
        }
    }

    let ids = store.conversation_ids();
    match ids.as_slice() {
        [] => bail!("Snapshot has no conversations. Start one with: branchtalk new"),
        [only] => Ok(only.clone()),
        many => bail!(
            "Snapshot has {} conversations, pick one with --conversation: {}",
            many.len(),
            many.join(", ")
        ),
    }
}

fn report_anomalies(session: &TreeSession) {
    let report = session.report();
    if report.is_clean() {
        return;
    }
    if !report.dropped_roots.is_empty() {
        eprintln!(
            "note: extra root messages not shown: {}",
            report.dropped_roots.join(", ")
        );
    }
    if report.unreachable > 0 {
        eprintln!("note: {} messages unreachable from root", report.unreachable);
    }
    if report.duplicate_ids > 0 {
        eprintln!("note: {} duplicate message IDs skipped", report.duplicate_ids);
    }
}
