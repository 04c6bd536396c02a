use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use is_terminal::IsTerminal;
use scriv::Engine;
use scriv::diff::{DiffKind, diff_lines};
use scriv::domain::{Author, Document, Oid, Repository, Version};
use scriv::error::Error;
use scriv::store::{DiskStore, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory a repository's store lives in
const STORE_DIR: &str = ".scriv";

/// Extension to mime type mapping for registered documents
static MIME_TYPES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "txt" => "text/plain",
    "md" => "text/markdown",
    "json" => "application/json",
    "html" => "text/html",
    "css" => "text/css",
    "csv" => "text/csv",
    "rs" => "text/x-rust",
    "toml" => "application/toml",
    "yaml" => "application/yaml",
    "yml" => "application/yaml",
};

#[derive(Parser)]
#[command(
    name = "scriv",
    version = "0.1.0",
    about = "A lightweight version-control engine for text documents",
    long_about = "scriv tracks revisions of text documents grouped into a repository, \
    organized into named branches with commit history, cherry-pick, rebase, \
    and three-way merge.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a repository in the current or given directory"
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(
        name = "commit",
        about = "Record a file's content as a new version",
        long_about = "This command records the given file as a new version of the matching \
        document, registering the document on first commit."
    )]
    Commit {
        #[arg(index = 1, help = "The file to commit")]
        file: String,
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(short, long, default_value = "main", help = "The branch to commit on")]
        branch: String,
    },
    #[command(name = "branch", about = "Manage branches")]
    Branch {
        #[command(subcommand)]
        command: BranchCommands,
    },
    #[command(name = "log", about = "Show a document's version history")]
    Log {
        #[arg(index = 1, help = "The document to show history for")]
        document: String,
    },
    #[command(name = "graph", about = "Show the repository commit graph")]
    Graph,
    #[command(name = "diff", about = "Show the line diff between two versions")]
    Diff {
        #[arg(index = 1, help = "The document the versions belong to")]
        document: String,
        #[arg(index = 2, help = "The old version id (prefix allowed)")]
        from: String,
        #[arg(index = 3, help = "The new version id (prefix allowed)")]
        to: String,
    },
    #[command(
        name = "cherry-pick",
        about = "Replay a single version onto another branch"
    )]
    CherryPick {
        #[arg(index = 1, help = "The version to pick (prefix allowed)")]
        version: String,
        #[arg(short, long, help = "The branch to graft the version onto")]
        branch: String,
    },
    #[command(name = "rebase", about = "Replay a branch's versions onto another branch")]
    Rebase {
        #[arg(index = 1, help = "The branch to replay")]
        source: String,
        #[arg(index = 2, help = "The branch to replay onto")]
        target: String,
    },
    #[command(name = "merge", about = "Merge a branch into another with three-way reconciliation")]
    Merge {
        #[arg(index = 1, help = "The branch to merge from")]
        source: String,
        #[arg(index = 2, help = "The branch to merge into")]
        target: String,
    },
    #[command(name = "show", about = "Print a document as seen from a branch")]
    Show {
        #[arg(index = 1, help = "The document to print")]
        document: String,
        #[arg(short, long, default_value = "main", help = "The branch to read through")]
        branch: String,
    },
}

#[derive(Subcommand)]
enum BranchCommands {
    #[command(name = "create", about = "Create a new branch")]
    Create {
        #[arg(index = 1, help = "The branch name")]
        name: String,
        #[arg(long, help = "Start the branch at an existing version (prefix allowed)")]
        at: Option<String>,
    },
    #[command(name = "list", about = "List branches")]
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            let path = match path {
                Some(path) => PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            init(&path).await
        }
        Commands::Commit {
            file,
            message,
            branch,
        } => {
            let (engine, repository) = open_engine().await?;
            commit(&engine, &repository, &file, &message, &branch).await
        }
        Commands::Branch { command } => {
            let (engine, repository) = open_engine().await?;
            match command {
                BranchCommands::Create { name, at } => {
                    create_branch(&engine, &repository, &name, at.as_deref()).await
                }
                BranchCommands::List => list_branches(&engine, &repository).await,
            }
        }
        Commands::Log { document } => {
            let (engine, repository) = open_engine().await?;
            log(&engine, &repository, &document).await
        }
        Commands::Graph => {
            let (engine, repository) = open_engine().await?;
            graph(&engine, &repository).await
        }
        Commands::Diff { document, from, to } => {
            let (engine, repository) = open_engine().await?;
            diff(&engine, &repository, &document, &from, &to).await
        }
        Commands::CherryPick { version, branch } => {
            let (engine, repository) = open_engine().await?;
            cherry_pick(&engine, &repository, &version, &branch).await
        }
        Commands::Rebase { source, target } => {
            let (engine, repository) = open_engine().await?;
            rebase(&engine, &repository, &source, &target).await
        }
        Commands::Merge { source, target } => {
            let (engine, repository) = open_engine().await?;
            merge(&engine, &repository, &source, &target).await
        }
        Commands::Show { document, branch } => {
            let (engine, repository) = open_engine().await?;
            show(&engine, &repository, &document, &branch).await
        }
    }
}

async fn init(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    let path = path.canonicalize()?;
    let store = DiskStore::new(path.join(STORE_DIR));
    if store.is_initialized() {
        bail!("already a scriv repository: {}", path.display());
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "repository".to_string());
    let owner = std::env::var("SCRIV_AUTHOR_NAME").unwrap_or_else(|_| "local".to_string());

    let engine = Engine::new(Arc::new(store));
    engine
        .create_repository(&name, "", &owner, None)
        .await
        .context("failed to create repository")?;

    println!("Initialized empty scriv repository in {}", path.display());
    Ok(())
}

async fn open_engine() -> Result<(Engine<DiskStore>, Repository)> {
    let cwd = std::env::current_dir()?;
    let store = DiskStore::new(cwd.join(STORE_DIR));
    if !store.is_initialized() {
        bail!("not a scriv repository (run `scriv init` first)");
    }
    let repository = store.current_repository().await?;
    Ok((Engine::new(Arc::new(store)), repository))
}

async fn commit(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    file: &str,
    message: &str,
    branch: &str,
) -> Result<()> {
    let author = Author::load_from_env()?;
    let content =
        std::fs::read(file).with_context(|| format!("failed to read file {}", file))?;

    let document = match engine.document_by_title(&repository.id, file).await? {
        Some(document) => document,
        None => {
            engine
                .create_document(&repository.id, file, mime_for_path(file), author.name())
                .await?
        }
    };

    let version = engine
        .commit(&document.id, content, message, &author, branch)
        .await?;
    println!(
        "[{} {}] {}",
        branch,
        version.id.short(),
        version.short_message()
    );
    Ok(())
}

async fn create_branch(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    name: &str,
    at: Option<&str>,
) -> Result<()> {
    let branch = match at {
        Some(prefix) => {
            let version = find_version(engine, repository, None, prefix).await?;
            engine
                .branch_from_version(&repository.id, &version.id, name)
                .await?
        }
        None => engine.create_branch(&repository.id, name).await?,
    };
    match &branch.latest_commit {
        Some(latest) => println!("Created branch {} at {}", branch.name, latest.short()),
        None => println!("Created branch {}", branch.name),
    }
    Ok(())
}

async fn list_branches(engine: &Engine<DiskStore>, repository: &Repository) -> Result<()> {
    let mut branches = engine.branches(&repository.id).await?;
    branches.sort_by(|a, b| a.name.cmp(&b.name));

    for branch in branches {
        let marker = if branch.is_default { "*" } else { " " };
        let tip = branch
            .latest_commit
            .as_ref()
            .map(|oid| oid.short().to_string())
            .unwrap_or_else(|| "(unborn)".to_string());
        println!("{} {} {}", marker, branch.name.to_string().green(), tip);
    }
    Ok(())
}

async fn log(engine: &Engine<DiskStore>, repository: &Repository, title: &str) -> Result<()> {
    let document = require_document(engine, repository, title).await?;
    let history = engine.history(&document.id).await?;

    let mut output = String::new();
    for version in history {
        output.push_str(&format!(
            "{} {}\n",
            format!("commit {}", version.id).yellow(),
            format!("({})", version.branch).green(),
        ));
        output.push_str(&format!("Author: {}\n", version.author.display_name()));
        output.push_str(&format!(
            "Date:   {}\n\n",
            version.created_at.format("%a %b %-d %H:%M:%S %Y %z")
        ));
        for line in version.commit_message.lines() {
            output.push_str(&format!("    {}\n", line));
        }
        output.push('\n');
    }
    page_or_print(output)
}

async fn graph(engine: &Engine<DiskStore>, repository: &Repository) -> Result<()> {
    let entries = engine.commit_graph(&repository.id).await?;
    let documents = engine.store().documents(&repository.id).await?;

    let mut output = String::new();
    for entry in entries {
        let title = documents
            .iter()
            .find(|d| d.id == entry.document_id)
            .map(|d| d.title.as_str())
            .unwrap_or("?");
        let parent = entry
            .parent_version
            .as_ref()
            .map(|oid| format!(" <- {}", oid.short()))
            .unwrap_or_default();
        output.push_str(&format!(
            "{} {} {} {}{}\n",
            entry.id.short().yellow(),
            format!("({})", entry.branch).green(),
            title.cyan(),
            entry.message.lines().next().unwrap_or(""),
            parent.dimmed(),
        ));
    }
    page_or_print(output)
}

async fn diff(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    title: &str,
    from: &str,
    to: &str,
) -> Result<()> {
    let document = require_document(engine, repository, title).await?;
    let from = find_version(engine, repository, Some(&document), from).await?;
    let to = find_version(engine, repository, Some(&document), to).await?;

    let old = String::from_utf8(from.content.to_vec()).context("old content is not utf-8")?;
    let new = String::from_utf8(to.content.to_vec()).context("new content is not utf-8")?;

    println!(
        "{}",
        format!("--- {} {}", title, from.id.short()).bold()
    );
    println!("{}", format!("+++ {} {}", title, to.id.short()).bold());
    for segment in diff_lines(&old, &new) {
        for line in segment.text.lines() {
            match segment.kind {
                DiffKind::Added => println!("{}", format!("+{}", line).green()),
                DiffKind::Removed => println!("{}", format!("-{}", line).red()),
                DiffKind::Unchanged => println!(" {}", line),
            }
        }
    }
    Ok(())
}

async fn cherry_pick(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    prefix: &str,
    branch: &str,
) -> Result<()> {
    let author = Author::load_from_env()?;
    let version = find_version(engine, repository, None, prefix).await?;
    let picked = engine.cherry_pick(&version.id, branch, &author).await?;
    println!(
        "[{} {}] {}",
        branch,
        picked.id.short(),
        picked.short_message()
    );
    Ok(())
}

async fn rebase(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    source: &str,
    target: &str,
) -> Result<()> {
    let author = Author::load_from_env()?;
    let replayed = engine
        .rebase(&repository.id, source, target, &author)
        .await?;

    if replayed.is_empty() {
        println!("Nothing to rebase: {} has no commits", source);
        return Ok(());
    }
    println!(
        "Rebased {} commit(s) from {} onto {}",
        replayed.len(),
        source,
        target
    );
    for version in replayed {
        println!("  {} {}", version.id.short().yellow(), version.short_message());
    }
    Ok(())
}

async fn merge(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    source: &str,
    target: &str,
) -> Result<()> {
    let author = Author::load_from_env()?;
    match engine.merge(&repository.id, source, target, &author).await {
        Ok(merged) if merged.is_empty() => {
            println!("Already up to date");
            Ok(())
        }
        Ok(merged) => {
            println!(
                "Merged {} into {} ({} document(s) updated)",
                source,
                target,
                merged.len()
            );
            for version in merged {
                println!("  {} {}", version.id.short().yellow(), version.short_message());
            }
            Ok(())
        }
        Err(Error::MergeConflict {
            document_id,
            ranges,
        }) => {
            let title = engine
                .store()
                .document(&document_id)
                .await
                .map(|d| d.title)
                .unwrap_or_else(|_| document_id.to_string());
            eprintln!("{}", format!("merge conflict in {}", title).red().bold());
            for range in ranges {
                eprintln!("  {}", format!("conflicting edits at {}", range).red());
            }
            bail!("merge aborted, nothing was applied");
        }
        Err(err) => Err(err.into()),
    }
}

async fn show(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    title: &str,
    branch: &str,
) -> Result<()> {
    let document = require_document(engine, repository, title).await?;
    match engine.resolve(&document.id, branch).await? {
        Some(version) => {
            use std::io::Write;
            std::io::stdout().write_all(&version.content)?;
            Ok(())
        }
        None => bail!("{} has no version on branch {}", title, branch),
    }
}

async fn require_document(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    title: &str,
) -> Result<Document> {
    engine
        .document_by_title(&repository.id, title)
        .await?
        .with_context(|| format!("no document named {}", title))
}

/// Resolve a version id prefix, scoped to a document when one is given
async fn find_version(
    engine: &Engine<DiskStore>,
    repository: &Repository,
    document: Option<&Document>,
    prefix: &str,
) -> Result<Version> {
    if prefix.len() < 4 {
        bail!("version prefix {} is too short (need at least 4 characters)", prefix);
    }
    let entries = engine.commit_graph(&repository.id).await?;
    let matches: Vec<&Oid> = entries
        .iter()
        .filter(|entry| document.is_none_or(|d| d.id == entry.document_id))
        .map(|entry| &entry.id)
        .filter(|id| id.as_ref().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(engine.version(id).await?),
        [] => bail!("no version matches {}", prefix),
        _ => bail!("version prefix {} is ambiguous", prefix),
    }
}

fn mime_for_path(path: &str) -> &'static str {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| MIME_TYPES.get(ext.to_ascii_lowercase().as_str()))
        .copied()
        .unwrap_or("text/plain")
}

/// Page long output when writing to a terminal, print otherwise
fn page_or_print(output: String) -> Result<()> {
    if std::env::var_os("NO_PAGER").is_none() && std::io::stdout().is_terminal() {
        let pager = minus::Pager::new();
        pager
            .push_str(&output)
            .map_err(|e| anyhow::anyhow!("pager error: {}", e))?;
        minus::page_all(pager).map_err(|e| anyhow::anyhow!("pager error: {}", e))?;
    } else {
        print!("{}", output);
    }
    Ok(())
}
