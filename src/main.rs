use catalog_media::batch::{self, BatchEvent, BatchOptions};
use catalog_media::imaging::RustBackend;
use catalog_media::items::ItemMapping;
use catalog_media::layout::LayoutCatalog;
use catalog_media::storage::{self, LocalObjectStore, MemoryCatalog};
use catalog_media::types::ItemId;
use catalog_media::{classify, config, output};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

#[derive(Parser)]
#[command(name = "catalog-media")]
#[command(about = "Layout compositing and derivative generation for catalog images")]
#[command(long_about = "\
Layout compositing and derivative generation for catalog images

Each folder under the source directory holds the photos of one item. Images
are classified by aspect ratio, combined into fixed layouts, and written as
200/300/400px WebP derivatives ready for upload.

Source structure:

  Images/
  ├── config.toml                  # Pipeline config (optional)
  ├── Shirt/                       # One folder per item
  │   ├── front.jpg
  │   └── back.jpg
  └── Jeans/
      └── side.png

Output of `layouts`:

  OutputImages/
  ├── manifest.json                # [{ item_ids, output_image_path }]
  └── four_squares_in_corners_0/
      ├── 200/four_squares_in_corners_0_lossless.webp
      ├── 200/four_squares_in_corners_0_compressed.webp
      └── ...

Run 'catalog-media gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Source image directory (one subfolder per item)
    #[arg(long, default_value = "Images", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "OutputImages", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that write composites.
#[derive(clap::Args, Clone)]
struct CompositeArgs {
    /// Keep full-size composites after writing their derivatives
    #[arg(long)]
    keep_composites: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify every image by aspect ratio and print bucket counts
    Categorize,
    /// Compose random multi-image layouts and write manifest.json
    Layouts {
        /// JSON folder → item-id mapping
        #[arg(long)]
        items: Option<PathBuf>,
        /// Number of layout attempts (overrides config)
        #[arg(long)]
        attempts: Option<usize>,
        /// RNG seed for a reproducible run (overrides config)
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        composite: CompositeArgs,
    },
    /// Put every image through its single-image layout
    Singles(CompositeArgs),
    /// Write the square-crop derivative matrix for every image
    Squares,
    /// Upload a derivative tree to an object store directory
    Upload {
        /// Item the files belong to
        #[arg(long)]
        item_id: String,
        /// Object store root directory
        #[arg(long)]
        bucket_dir: PathBuf,
        /// Folder to upload (defaults to the output directory)
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Register a new item and attach every derivative folder under it
    Register {
        /// Folder holding one derivative subfolder per image
        #[arg(long)]
        folder: PathBuf,
        /// Object store root directory
        #[arg(long)]
        bucket_dir: PathBuf,
        /// Catalog store JSON file (created if missing)
        #[arg(long)]
        catalog: PathBuf,
        /// Item metadata as a JSON file
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Record every layout of manifest.json in the catalog store
    Ingest {
        /// Catalog store JSON file (created if missing)
        #[arg(long)]
        catalog: PathBuf,
        /// Manifest to ingest (defaults to <output>/manifest.json)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Categorize => {
            let categorization = classify::categorize(&RustBackend::new(), &cli.source)?;
            for skipped in &categorization.skipped {
                for line in output::format_batch_event(&BatchEvent::FileSkipped {
                    path: skipped.path.clone(),
                    reason: skipped.reason.clone(),
                }) {
                    println!("{}", line);
                }
            }
            output::print_categories(&categorization.categories, categorization.skipped.len());
        }
        Command::Layouts {
            items,
            attempts,
            seed,
            composite,
        } => {
            let pipeline = config::load_config(&cli.source)?;
            let mapping = match items {
                Some(path) => ItemMapping::load(&path)?,
                None => ItemMapping::new(),
            };
            let options = BatchOptions {
                attempts: attempts.unwrap_or(pipeline.batch.attempts),
                keep_composites: composite.keep_composites || pipeline.batch.keep_composites,
            };
            let mut rng = match seed.or(pipeline.batch.seed) {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let backend = RustBackend::new();

            let (tx, printer) = spawn_printer();
            let categories = batch::categorize_tree(&backend, &cli.source, Some(tx.clone()))?;
            let report = batch::run_layouts(
                &backend,
                &LayoutCatalog::standard(),
                &categories,
                &mapping,
                &cli.output,
                &options,
                &mut rng,
                Some(tx),
            )?;
            join_printer(printer)?;

            let manifest_path = cli.output.join("manifest.json");
            batch::write_manifest(&manifest_path, &report.results)?;
            for line in output::format_layout_summary(&report, &manifest_path) {
                println!("{}", line);
            }
        }
        Command::Singles(composite) => {
            let pipeline = config::load_config(&cli.source)?;
            let options = BatchOptions {
                keep_composites: composite.keep_composites || pipeline.batch.keep_composites,
                ..BatchOptions::default()
            };
            let (tx, printer) = spawn_printer();
            let report = batch::process_singles(
                &RustBackend::new(),
                &LayoutCatalog::standard(),
                &cli.source,
                &cli.output,
                &options,
                Some(tx),
            )?;
            join_printer(printer)?;
            print_lines(output::format_pass_summary(&report));
        }
        Command::Squares => {
            let (tx, printer) = spawn_printer();
            let report =
                batch::process_squares(&RustBackend::new(), &cli.source, &cli.output, Some(tx))?;
            join_printer(printer)?;
            print_lines(output::format_pass_summary(&report));
        }
        Command::Upload {
            item_id,
            bucket_dir,
            folder,
        } => {
            let pipeline = config::load_config(&cli.source)?;
            init_thread_pool(&pipeline.processing);
            let store = LocalObjectStore::new(bucket_dir);
            let folder = folder.unwrap_or_else(|| cli.output.clone());
            let prefix = format!("{}/{}", pipeline.storage.category, ItemId::new(item_id));

            let keys = storage::upload_folder(&store, &folder, &prefix)?;
            print_lines(output::format_upload(&keys));
            let versions = storage::group_image_versions(&store, &keys)?;
            print_lines(output::format_image_versions(&versions));
        }
        Command::Register {
            folder,
            bucket_dir,
            catalog,
            data,
        } => {
            let pipeline = config::load_config(&cli.source)?;
            init_thread_pool(&pipeline.processing);
            let item = match data {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => serde_json::json!({ "name": folder_name(&folder) }),
            };
            let store = LocalObjectStore::new(bucket_dir);
            let mut records = MemoryCatalog::load_or_default(&catalog)?;

            let id = storage::register_item_with_images(
                &mut records,
                &store,
                &folder,
                item,
                &pipeline.storage.category,
            )?;
            records.save(&catalog)?;
            println!("Registered item {}", id);
        }
        Command::Ingest { catalog, manifest } => {
            let manifest = manifest.unwrap_or_else(|| cli.output.join("manifest.json"));
            let results = batch::read_manifest(&manifest)?;
            let mut records = MemoryCatalog::load_or_default(&catalog)?;
            let count = storage::ingest_layout_results(&mut records, &results)?;
            records.save(&catalog)?;
            println!("Ingested {} layouts into {}", count, catalog.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Start a thread printing batch events as they arrive.
fn spawn_printer() -> (Sender<BatchEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_batch_event(&event) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) -> Result<(), Box<dyn std::error::Error>> {
    printer
        .join()
        .map_err(|_| "progress printer thread panicked".into())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
