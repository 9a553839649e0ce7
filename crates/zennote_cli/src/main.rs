//! Command-line front end for a ZenNote store.
//!
//! # Responsibility
//! - Open one store from config/env/flags and run a single command on it.
//! - Flush pending autosave drafts before exit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use zennote_core::{
    default_log_level, init_logging, FolderId, HierarchyIndex, NoteId, NoteStore, SearchQuery,
    Snapshot, SqliteSnapshotRepository, StoreConfig,
};

const DEFAULT_DB_FILE: &str = "zennote.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "zennote")]
#[command(about = "Folder/note document store")]
struct Args {
    /// JSON config file; missing file means defaults
    #[arg(short, long, default_value = "zennote.json")]
    config: PathBuf,

    /// SQLite database file (overrides config and env)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Store key (overrides config and env)
    #[arg(long)]
    store_key: Option<String>,

    /// Write rotating logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the folder tree with notes
    Tree,
    /// Create a folder
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<FolderId>,
    },
    /// Create a note, optionally with initial content
    NewNote {
        title: String,
        #[arg(long)]
        folder: Option<FolderId>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Rename a folder or note
    Rename { id: String, name: String },
    /// Open or close a folder
    Toggle { id: FolderId },
    /// Move a folder or note; omit --to for root/unfiled
    Mv {
        id: String,
        #[arg(long)]
        to: Option<FolderId>,
    },
    /// Delete a note, or a folder with everything inside it
    Rm { id: String },
    /// Print one note
    Show { id: NoteId },
    /// Replace a note's content
    Write {
        id: NoteId,
        content: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Append markup to a note
    Append { id: NoteId, markup: String },
    /// Search note titles and text
    Search {
        term: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write the whole collection as JSON
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the whole collection from a JSON export
    Import { file: PathBuf },
}

enum EntityRef {
    Folder(FolderId),
    Note(NoteId),
}

impl EntityRef {
    fn parse(value: &str) -> Result<Self> {
        if let Ok(id) = value.parse::<FolderId>() {
            return Ok(Self::Folder(id));
        }
        match value.parse::<NoteId>() {
            Ok(id) => Ok(Self::Note(id)),
            Err(_) => bail!("`{value}` is neither a folder id (f-...) nor a note id (n-...)"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(anyhow::Error::msg)?;
    }

    let config = load_config(&args)?;
    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
    let repo = SqliteSnapshotRepository::open(&db_path, &config.store_key)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let store = NoteStore::open_with_config(Arc::new(repo), &config).await?;
    info!(
        "event=cli_start module=cli store_key={} db={}",
        config.store_key,
        db_path.display()
    );

    run(&store, args.command).await?;
    store.flush_all().await?;
    Ok(())
}

fn load_config(args: &Args) -> Result<StoreConfig> {
    let mut config = StoreConfig::load(&args.config)?
        .with_overrides(|name| std::env::var(name).ok())?;
    if let Some(db) = &args.db {
        config.database_path = Some(db.clone());
    }
    if let Some(store_key) = &args.store_key {
        config.store_key = store_key.clone();
    }
    Ok(config.validate()?)
}

async fn run(store: &NoteStore<SqliteSnapshotRepository>, command: Command) -> Result<()> {
    match command {
        Command::Tree => print_tree(&store.snapshot()),
        Command::Mkdir { name, parent } => {
            let folder = store.create_folder(&name, parent).await?;
            println!("{}\t{}", folder.id, folder.name);
        }
        Command::NewNote {
            title,
            folder,
            content,
        } => {
            let note = store.create_note(&title, folder).await?;
            if let Some(content) = content {
                store.edit_note(note.id, "", &content).await?;
            }
            println!("{}\t{}", note.id, note.title);
        }
        Command::Rename { id, name } => match EntityRef::parse(&id)? {
            EntityRef::Folder(id) => {
                let folder = store.rename_folder(id, &name).await?;
                println!("{}\t{}", folder.id, folder.name);
            }
            EntityRef::Note(id) => {
                let note = store.rename_note(id, &name).await?;
                println!("{}\t{}", note.id, note.title);
            }
        },
        Command::Toggle { id } => {
            let folder = store.toggle_folder(id).await?;
            println!("{}\t{}", folder.id, if folder.is_open { "open" } else { "closed" });
        }
        Command::Mv { id, to } => match EntityRef::parse(&id)? {
            EntityRef::Folder(id) => {
                store.move_folder(id, to).await?;
            }
            EntityRef::Note(_) => {
                store.move_note_by_transfer(&id, to).await?;
            }
        },
        Command::Rm { id } => match EntityRef::parse(&id)? {
            EntityRef::Folder(id) => {
                let removed = store.delete_folder(id).await?;
                println!(
                    "removed {} folder(s), {} note(s)",
                    removed.folder_ids.len(),
                    removed.note_ids.len()
                );
            }
            EntityRef::Note(id) => store.delete_note(id).await?,
        },
        Command::Show { id } => {
            let Some(note) = store.note_view(id) else {
                bail!("note not found: {id}");
            };
            println!("{}\n\n{}", note.title, note.content);
        }
        Command::Write { id, content, title } => {
            store.edit_note(id, &title, &content).await?;
        }
        Command::Append { id, markup } => {
            store.append_to_note(id, &markup).await?;
        }
        Command::Search { term, limit } => {
            let query = SearchQuery { text: term, limit };
            for hit in store.search(&query) {
                println!(
                    "{}\t{}\t{}",
                    hit.note_id,
                    hit.title,
                    hit.snippet.unwrap_or_default()
                );
            }
        }
        Command::Export { out } => {
            let json = serde_json::to_string_pretty(&store.snapshot())?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let snapshot: Snapshot = serde_json::from_str(&raw)?;
            let report = store.import(snapshot).await?;
            if !report.is_clean() {
                eprintln!("import repaired inconsistencies: {report:?}");
            }
        }
    }
    Ok(())
}

fn print_tree(snapshot: &Snapshot) {
    let index = HierarchyIndex::build(snapshot);
    print_level(&index, None, 0);
    for note in index.child_notes(None) {
        println!("{}\t{}", note.title, note.id);
    }
}

fn print_level(index: &HierarchyIndex<'_>, parent: Option<FolderId>, depth: usize) {
    let indent = "  ".repeat(depth);
    for folder in index.child_folders(parent) {
        let marker = if folder.is_open { "v" } else { ">" };
        println!("{indent}{marker} {}/\t{}", folder.name, folder.id);
        if !folder.is_open {
            continue;
        }
        print_level(index, Some(folder.id), depth + 1);
        for note in index.child_notes(Some(folder.id)) {
            println!("{indent}  {}\t{}", note.title, note.id);
        }
    }
}
