use std::{
    error::Error,
    fmt::Display,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Instant,
};

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use display_error_chain::DisplayErrorChain;
use file_format::FileFormat;
use library::{
    cache::ReadingsCache,
    dictionary::{import::import_readings, store::DictionaryFile},
    fragment::Fragment,
    reading::{
        ReadingProvider, annotate_html, cached::CachedReadingProvider,
        dictionary::DictionaryReadingProvider,
    },
};
use log::info;
use tokio::task::JoinSet;
use vfs::{PhysicalFS, VfsPath};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the readings dictionary file
    #[arg(short, long, value_name = "FILE")]
    dictionary_path: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import surface/reading pairs from a tab-separated file
    ImportReadings {
        /// Dictionary language
        #[arg(short, long, value_name = "LANG", default_value = "jpn")]
        language: String,
        /// Path to readings file
        path: PathBuf,
    },
    /// Show dictionary summary
    Info {},
    /// Overlay furigana on HTML note files
    Annotate {
        /// Input note files
        paths: Vec<PathBuf>,
        /// Directory for annotated output (defaults to writing next to each input)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Number of parallel annotation workers
        #[arg(short, long, value_name = "NUM")]
        n_parallel: Option<usize>,
    },
    /// Print the visible text of an HTML note file, reading text excluded
    ExtractText {
        /// Path to note file
        path: PathBuf,
    },
}

#[derive(Debug)]
enum CliError {
    UnsupportedFormat(String),
    InvalidDictionaryPath(PathBuf),
}

impl Error for CliError {}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::UnsupportedFormat(format) => write!(f, "Unsupported file format '{format}'"),
            CliError::InvalidDictionaryPath(path) => {
                write!(f, "Invalid dictionary path {path:?}")
            }
        }
    }
}

fn dictionary_file_path(path: &Path) -> anyhow::Result<VfsPath> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::InvalidDictionaryPath(path.to_path_buf()))?;
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

    let root: VfsPath = PhysicalFS::new(parent.unwrap_or(Path::new("."))).into();
    Ok(root.join(file_name)?)
}

fn import(dictionary_path: &Path, language: &str, path: &Path) -> anyhow::Result<()> {
    let fmt = FileFormat::from_file(path)?;
    if fmt.media_type() != "text/plain" {
        Err(CliError::UnsupportedFormat(fmt.media_type().to_owned()))?;
    }

    let mut dictionary = DictionaryFile::load_or_create(&dictionary_file_path(dictionary_path)?, language)?;
    let stats = import_readings(BufReader::new(File::open(path)?), &mut dictionary.dictionary)?;
    dictionary.save()?;

    println!(
        "Imported {} readings ({} skipped), dictionary now holds {}",
        stats.imported,
        stats.skipped,
        dictionary.dictionary.len()
    );

    Ok(())
}

fn show_info(dictionary_path: &Path) -> anyhow::Result<()> {
    let dictionary = DictionaryFile::load(&dictionary_file_path(dictionary_path)?)?;
    println!("language\treadings");
    println!(
        "{}\t{}",
        dictionary.dictionary.language,
        dictionary.dictionary.len()
    );
    Ok(())
}

fn extract_text(path: &Path) -> anyhow::Result<()> {
    let markup = std::fs::read_to_string(path)?;
    let fragment = Fragment::parse(&markup)?;
    println!("{}", fragment.text());
    Ok(())
}

async fn annotate_file(
    provider: &impl ReadingProvider,
    path: &Path,
    output_dir: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let fmt = FileFormat::from_file(path)?;
    if !matches!(fmt.media_type(), "text/plain" | "text/html") {
        Err(CliError::UnsupportedFormat(fmt.media_type().to_owned()))?;
    }

    let markup = tokio::fs::read_to_string(path).await?;
    let annotated = annotate_html(provider, &markup).await;

    let file_name = format!(
        "{}.furigana.html",
        path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("note")
    );
    let output = match output_dir {
        Some(dir) => dir.join(file_name),
        None => path.with_file_name(file_name),
    };
    tokio::fs::write(&output, annotated).await?;

    Ok(output)
}

async fn annotate_files(
    dictionary_path: &Path,
    paths: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    n_workers: usize,
) -> anyhow::Result<()> {
    let dictionary = DictionaryFile::load(&dictionary_file_path(dictionary_path)?)?;
    info!(
        "Annotating {} files with {} readings",
        paths.len(),
        dictionary.dictionary.len()
    );

    let cache = Arc::new(get_cache().await?);
    let provider = Arc::new(CachedReadingProvider::new(
        DictionaryReadingProvider::new(&dictionary.dictionary),
        cache,
    ));

    let start_time = Instant::now();

    let (tx, rx) = flume::unbounded::<PathBuf>();

    let mut set = JoinSet::new();
    for i in 0..n_workers {
        let rx = rx.clone();
        let provider = provider.clone();
        let output_dir = output_dir.clone();
        set.spawn(async move {
            // Receive until the channel is closed (all senders dropped)
            while let Ok(path) = rx.recv_async().await {
                match annotate_file(provider.as_ref(), &path, output_dir.as_deref()).await {
                    Ok(output) => {
                        println!("Worker {i}: {} -> {}", path.display(), output.display())
                    }
                    Err(err) => {
                        eprintln!("Worker {i}: Failed to annotate {}: {}", path.display(), err)
                    }
                }
            }
        });
    }

    for path in paths {
        tx.send_async(path).await?;
    }
    drop(tx);

    set.join_all().await;

    println!("Annotated in: {:?}", start_time.elapsed());

    Ok(())
}

async fn get_cache() -> anyhow::Result<ReadingsCache> {
    let dirs = ProjectDirs::from("", "", "furigana-notes").unwrap();
    let cache_dir = dirs.cache_dir();
    ReadingsCache::create(cache_dir).await
}

#[tokio::main]
async fn main() -> ExitCode {
    match do_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error_chain = DisplayErrorChain::new(
                e.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
            );
            eprintln!("{error_chain}");
            ExitCode::FAILURE
        }
    }
}

async fn do_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(cmd) => match cmd {
            Commands::ImportReadings { language, path } => {
                import(&cli.dictionary_path, language, path)?;
            }
            Commands::Info {} => {
                show_info(&cli.dictionary_path)?;
            }
            Commands::Annotate {
                paths,
                output_dir,
                n_parallel,
            } => {
                annotate_files(
                    &cli.dictionary_path,
                    paths.clone(),
                    output_dir.clone(),
                    n_parallel.unwrap_or(4),
                )
                .await?;
            }
            Commands::ExtractText { path } => {
                extract_text(path)?;
            }
        },
        None => {
            println!("Specify command");
        }
    }

    Ok(())
}
