//! Noteful CLI - notes, folders and tags in a local SQLite database.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use noteful_core::{CreateNote, Note, NoteQuery, NotefulService, UpdateNote};
use noteful_sqlite::SqliteDatabase;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const NOTEFUL_DIR: &str = ".noteful";
const DB_FILE: &str = "db.sqlite";

#[derive(Parser)]
#[command(name = "noteful", about = "Notes, folders and tags", version)]
struct Cli {
    /// Database file (default: .noteful/db.sqlite in this or a parent directory)
    #[arg(long, env = "NOTEFUL_DB", global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new noteful database in the current directory
    Init {
        /// Delete existing database and reinitialize
        #[arg(long)]
        reinitialize: bool,
    },
    /// Add a new note
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// Note content (reads from stdin if not provided and stdin is not a tty)
        #[arg(long)]
        content: Option<String>,
        /// Folder ID
        #[arg(long)]
        folder: Option<i64>,
        /// Comma-separated tag IDs
        #[arg(long)]
        tags: Option<String>,
    },
    /// List notes
    Ls {
        /// Only notes whose title contains this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,
        /// Only notes in this folder
        #[arg(long)]
        folder: Option<i64>,
        /// Only notes carrying this tag
        #[arg(long)]
        tag: Option<i64>,
    },
    /// Show one or more notes
    Show {
        /// Comma-separated note IDs
        ids: String,
    },
    /// Edit a note
    Edit {
        /// Note ID
        id: i64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New content (reads from stdin if not provided and stdin is not a tty)
        #[arg(long)]
        content: Option<String>,
        /// Move the note to this folder
        #[arg(long, conflicts_with = "no_folder")]
        folder: Option<i64>,
        /// Take the note out of its folder
        #[arg(long)]
        no_folder: bool,
        /// Replace the note's tags with these comma-separated tag IDs
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete one or more notes
    Rm {
        /// Comma-separated note IDs
        ids: String,
    },
    /// Manage folders
    Folders {
        #[command(subcommand)]
        command: NamedCommands,
    },
    /// Manage tags
    Tags {
        #[command(subcommand)]
        command: NamedCommands,
    },
}

#[derive(Subcommand)]
enum NamedCommands {
    /// List all
    Ls,
    /// Create one
    Add { name: String },
    /// Rename one
    Rename { id: i64, name: String },
    /// Delete one
    Rm { id: i64 },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();
}

/// Find the .noteful directory by searching up from current directory
fn find_noteful_dir() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let path = current.join(NOTEFUL_DIR);
        if path.is_dir() {
            return Some(path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the database path, or error if not initialized
fn get_db_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Database {} does not exist. Run 'noteful init' first.", path.display());
        }
        return Ok(path);
    }
    match find_noteful_dir() {
        Some(dir) => Ok(dir.join(DB_FILE)),
        None => bail!(
            "No .noteful directory found. Run 'noteful init' to initialize a new database."
        ),
    }
}

fn init_database(explicit: Option<PathBuf>, reinitialize: bool) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let dir = PathBuf::from(NOTEFUL_DIR);
            std::fs::create_dir_all(&dir).context("Failed to create .noteful directory")?;
            dir.join(DB_FILE)
        }
    };

    if path.exists() {
        if !reinitialize {
            bail!(
                "Noteful is already initialized here. Use --reinitialize to delete and recreate."
            );
        }
        std::fs::remove_file(&path).context("Failed to remove existing database")?;
    }

    SqliteDatabase::open(&path).context("Failed to create database")?;
    Ok(path)
}

fn open_service(path: &Path) -> Result<NotefulService<SqliteDatabase>> {
    let db = SqliteDatabase::open(path).context("Failed to open database")?;
    Ok(NotefulService::new(db))
}

fn parse_ids(ids: &str) -> Result<Vec<i64>> {
    ids.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().context(format!("Invalid ID: {}", s)))
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn content_arg(content: Option<String>) -> Result<Option<String>> {
    match content {
        Some(c) => Ok(Some(c)),
        None if !is_stdin_tty() => Ok(Some(read_stdin()?)),
        None => Ok(None),
    }
}

fn format_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|t| format!("#{}", t.name))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_summary(note: &Note) {
    let folder = note
        .folder
        .as_ref()
        .map(|f| format!(" [{}]", f.name))
        .unwrap_or_default();
    let tags = format_tags(note);
    if tags.is_empty() {
        println!("{}: {}{}", note.id, note.title, folder);
    } else {
        println!("{}: {}{} {}", note.id, note.title, folder, tags);
    }
}

async fn run_named(
    service: &NotefulService<SqliteDatabase>,
    kind: &str,
    command: NamedCommands,
) -> Result<()> {
    let is_folder = kind == "folder";
    match command {
        NamedCommands::Ls => {
            let items: Vec<(i64, String)> = if is_folder {
                service
                    .list_folders()
                    .await?
                    .into_iter()
                    .map(|f| (f.id, f.name))
                    .collect()
            } else {
                service
                    .list_tags()
                    .await?
                    .into_iter()
                    .map(|t| (t.id, t.name))
                    .collect()
            };
            for (id, name) in items {
                println!("{}: {}", id, name);
            }
        }
        NamedCommands::Add { name } => {
            let id = if is_folder {
                service.create_folder(&name).await?.id
            } else {
                service.create_tag(&name).await?.id
            };
            println!("Added {} {}", kind, id);
        }
        NamedCommands::Rename { id, name } => {
            let found = if is_folder {
                service.update_folder(id, &name).await?.is_some()
            } else {
                service.update_tag(id, &name).await?.is_some()
            };
            if !found {
                eprintln!("{} {} not found", kind, id);
                std::process::exit(1);
            }
            println!("Renamed {} {}", kind, id);
        }
        NamedCommands::Rm { id } => {
            let deleted = if is_folder {
                service.delete_folder(id).await?
            } else {
                service.delete_tag(id).await?
            };
            if !deleted {
                eprintln!("{} {} not found", kind, id);
                std::process::exit(1);
            }
            println!("Deleted {} {}", kind, id);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Init { reinitialize } = cli.command {
        let path = init_database(cli.db, reinitialize)?;
        if reinitialize {
            println!("Reinitialized noteful database in {}", path.display());
        } else {
            println!("Initialized noteful database in {}", path.display());
        }
        return Ok(());
    }

    // All other commands need the database
    let path = get_db_path(cli.db)?;
    let service = open_service(&path)?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Add {
            title,
            content,
            folder,
            tags,
        } => {
            let tags = tags.map(|t| parse_ids(&t)).transpose()?.unwrap_or_default();
            let note = service
                .create_note(CreateNote {
                    title,
                    content: content_arg(content)?,
                    folder_id: folder,
                    tags,
                })
                .await?;
            println!("Added note {}", note.id);
        }

        Commands::Ls {
            search,
            folder,
            tag,
        } => {
            let notes = service
                .list_notes(NoteQuery {
                    search_term: search,
                    folder_id: folder,
                    tag_id: tag,
                })
                .await?;
            for note in &notes {
                print_summary(note);
            }
        }

        Commands::Show { ids } => {
            let ids = parse_ids(&ids)?;
            if ids.is_empty() {
                eprintln!("No note IDs provided");
                std::process::exit(1);
            }

            let mut not_found = Vec::new();
            let mut first = true;

            for id in &ids {
                match service.get_note(*id).await? {
                    Some(note) => {
                        if !first {
                            println!("\n{}\n", "=".repeat(40));
                        }
                        first = false;

                        println!("# {}\n", note.title);
                        if let Some(ref content) = note.content {
                            println!("{}", content);
                        }
                        println!("\n---\n");
                        if let Some(ref folder) = note.folder {
                            println!("Folder: {}", folder.name);
                        }
                        println!("Tags: {}", format_tags(&note));
                    }
                    None => {
                        not_found.push(*id);
                    }
                }
            }

            if !not_found.is_empty() {
                for id in &not_found {
                    eprintln!("Note {} not found", id);
                }
                std::process::exit(1);
            }
        }

        Commands::Edit {
            id,
            title,
            content,
            folder,
            no_folder,
            tags,
        } => {
            let content = content_arg(content)?;
            let folder_id = if no_folder { Some(None) } else { folder.map(Some) };
            let tags = tags.map(|t| parse_ids(&t)).transpose()?;

            let mut update = UpdateNote {
                title,
                content: content.map(Some),
                folder_id,
                tags,
            };

            if update.is_empty() {
                eprintln!("Nothing to update");
                std::process::exit(1);
            }

            // Every update carries a title; keep the current one unless given
            if update.title.is_none() {
                match service.get_note(id).await? {
                    Some(note) => update.title = Some(note.title),
                    None => {
                        eprintln!("Note {} not found", id);
                        std::process::exit(1);
                    }
                }
            }

            match service.update_note(id, update).await? {
                Some(note) => println!("Edited note {}", note.id),
                None => {
                    eprintln!("Note {} not found", id);
                    std::process::exit(1);
                }
            }
        }

        Commands::Rm { ids } => {
            let ids = parse_ids(&ids)?;
            if ids.is_empty() {
                eprintln!("No note IDs provided");
                std::process::exit(1);
            }

            let mut not_found = Vec::new();
            for id in &ids {
                if service.delete_note(*id).await? {
                    println!("Deleted note {}", id);
                } else {
                    not_found.push(*id);
                }
            }

            if !not_found.is_empty() {
                for id in &not_found {
                    eprintln!("Note {} not found", id);
                }
                std::process::exit(1);
            }
        }

        Commands::Folders { command } => run_named(&service, "folder", command).await?,

        Commands::Tags { command } => run_named(&service, "tag", command).await?,
    }

    Ok(())
}
