use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use fieldsearch_core::config::Config;
use fieldsearch_core::types::{Document, FileMetadata, SearchRequest, WeightSlot};
use fieldsearch_orchestrator::{plain_text_from_html, PriorityQueueExecutor, SearchOrchestrator, TaskOutcome};

const USAGE: &str = "Usage: fieldsearch [--index <name>] <command> [args...]

Commands:
  index <module> <entity> <text> [--title <t>] [--boost <n>]
  index-dir <dir> [--module <m>] [--reset]
  remove <module> <entity>
  reset
  search <query> [--limit <n>] [--offset <n>]";

const INDEXABLE_EXTENSIONS: [&str; 4] = ["txt", "md", "html", "htm"];

struct Args {
    index: Option<String>,
    command: String,
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl Args {
    fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().find(|(n, _)| n == name).and_then(|(_, v)| v.as_deref())
    }

    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> anyhow::Result<T> {
        match self.option(name) {
            Some(raw) => raw.parse().map_err(|_| anyhow::anyhow!("--{name} expects a number, got '{raw}'")),
            None => Ok(default),
        }
    }

    fn positional(&self, i: usize, what: &str) -> anyhow::Result<&str> {
        self.positional.get(i).map(String::as_str).with_context(|| format!("missing <{what}>\n\n{USAGE}"))
    }
}

fn parse_args() -> Args {
    let mut raw = env::args().skip(1).peekable();
    let mut args = Args { index: None, command: String::new(), positional: Vec::new(), options: Vec::new() };
    while let Some(arg) = raw.next() {
        match arg.strip_prefix("--") {
            Some("reset") => args.options.push(("reset".into(), None)),
            Some("index") => args.index = raw.next(),
            Some(name) => {
                let value = raw.next_if(|v| !v.starts_with("--"));
                args.options.push((name.to_string(), value));
            }
            None if args.command.is_empty() => args.command = arg,
            None => args.positional.push(arg),
        }
    }
    if args.command.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    args
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {e}"); e })?;
    let mut settings = config.search_settings()?;
    settings.index_root.get_or_insert_with(|| "../dev_data/indexes/fieldsearch".to_string());
    let args = parse_args();

    let executor = Arc::new(PriorityQueueExecutor::new());
    let orchestrator = SearchOrchestrator::builder(executor.clone()).settings(settings).build()?;
    let index_name = args.index.clone().unwrap_or_else(|| orchestrator.settings().default_index_name.clone());
    let scope = orchestrator.scope(index_name.as_str());

    match args.command.as_str() {
        "index" => {
            let text = args.positional(2, "text")?;
            let metadata = FileMetadata { title: args.option("title").unwrap_or(text).to_string(), ..FileMetadata::default() };
            let document = Document::new(args.positional(0, "module")?, args.positional(1, "entity")?)
                .with_boost(args.parsed("boost", 1.0)?)
                .with_text(WeightSlot::Weight0, text)
                .with_metadata(metadata);
            let handle = scope.enqueue_index(document, false)?;
            executor.run_pending();
            println!("✅ {:?}", handle.wait().await?);
        }
        "index-dir" => {
            let dir = PathBuf::from(args.positional(0, "dir")?);
            let module = args.option("module").unwrap_or("files");
            if args.flag("reset") {
                scope.enqueue_reset()?;
            }
            let files: Vec<PathBuf> = WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(|p| p.extension().and_then(|e| e.to_str()).is_some_and(|e| INDEXABLE_EXTENSIONS.contains(&e)))
                .collect();
            println!("Indexing {} files from {} into '{}'", files.len(), dir.display(), scope.name());
            let mut handles = Vec::with_capacity(files.len());
            for path in &files {
                match file_document(&dir, path, module) {
                    Ok(document) => handles.push(scope.enqueue_index(document, false)?),
                    Err(err) => eprintln!("⚠️  Skipping {}: {err:#}", path.display()),
                }
            }
            info!(index = %scope.name(), queued = executor.len(), "Draining index queue");
            let pb = ProgressBar::new(executor.len() as u64);
            pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tasks ({percent}%)")?.progress_chars("#>-"));
            while executor.run_next() { pb.inc(1); }
            pb.finish_and_clear();
            let mut indexed = 0usize;
            for handle in handles {
                match handle.wait().await {
                    Ok(TaskOutcome::Indexed { .. }) => indexed += 1,
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "Index task failed"),
                }
            }
            info!(index = %scope.name(), indexed, files = files.len(), "Index queue drained");
            println!("📊 Indexed {indexed} of {} files", files.len());
        }
        "remove" => {
            let handle = scope.enqueue_remove(args.positional(0, "module")?, args.positional(1, "entity")?, FileMetadata::default())?;
            executor.run_pending();
            println!("✅ {:?}", handle.wait().await?);
        }
        "reset" => {
            let handle = scope.enqueue_reset()?;
            executor.run_pending();
            println!("✅ {:?}", handle.wait().await?);
        }
        "search" => {
            let query = args.positional(0, "query")?;
            let request = SearchRequest::new(query, args.parsed("limit", 10)?, args.parsed("offset", 0)?);
            let (tx, rx) = tokio::sync::oneshot::channel();
            scope.search(request, move |response| { let _ = tx.send(response); }, None)?;
            executor.run_pending();
            let response = rx.await.context("search completion dropped")??;
            println!("🔍 {} hits for \"{query}\" ({:?})", response.total_hits, response.source);
            for (i, result) in response.results.iter().enumerate() {
                println!("  {}. score={:.4}  {}/{}  {}", i + 1, result.score, result.module_id, result.entity_id, result.title);
                if !result.uri.is_empty() { println!("     {}", result.uri); }
            }
            for suggestion in &response.suggestions {
                println!("💡 Did you mean: {}", suggestion.text);
            }
        }
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
    Ok(())
}

/// File stem goes to the heaviest column, the body to the middle one.
fn file_document(root: &Path, path: &Path, module: &str) -> anyhow::Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    let body = if extension.starts_with("htm") { plain_text_from_html(&raw) } else { raw };
    let relative = path.strip_prefix(root).unwrap_or(path);
    let title = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
    let parent_title = relative.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()).unwrap_or_default().to_string();
    let metadata = FileMetadata {
        title: title.clone(),
        parent_title: parent_title.clone(),
        uri: path.display().to_string(),
        file_type: extension,
        ..FileMetadata::default()
    };
    Ok(Document::new(module, relative.display().to_string())
        .with_text(WeightSlot::Weight0, title)
        .with_text(WeightSlot::Weight1, parent_title)
        .with_text(WeightSlot::Weight2, body)
        .with_metadata(metadata))
}
