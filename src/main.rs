use clap::{Parser, Subcommand};
use quire::cache::ChapterCache;
use quire::visibility::BuildOptions;
use quire::{config, generate, logging, output, scan};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Static site generator for serialized fiction")]
#[command(long_about = "\
Static site generator for serialized fiction

Stories are directories under content/. Each story declares its arcs and
chapters in config.yaml; chapters are markdown files with optional YAML front
matter. Translations live in two-letter language subdirectories and fall back
to the primary language when missing.

Source structure:

  site_config.yaml                 # Site config (optional)
  authors.yaml                     # Author profiles (optional)
  static/                          # Copied to /static/
  content/
  └── my-novel/
      ├── config.yaml              # Title, arcs, chapter order, overrides
      ├── cover.jpg
      └── chapters/
          ├── chapter-1.md         # Primary language
          ├── map.png              # Referenced as ![Map](map.png)
          └── fr/
              └── chapter-1.md     # French translation

Chapter front matter:
  title, published (YYYY-MM-DD), tags, hidden, draft, password,
  password_hint, translator_commentary, author, translator,
  seo.*, social_embeds.*, show_tags, show_metadata,
  show_translation_notes, comments.enabled

Hidden, draft (unless --include-drafts) and password-protected chapters get a
page but are left out of the table of contents, navigation, tags, sitemap,
feeds and e-books.

Run 'quire gen-config' to generate a documented site_config.yaml.")]
#[command(version)]
struct Cli {
    /// Source directory (holds site_config.yaml and content/)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory, deleted and recreated on build
    #[arg(long, default_value = "build", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the complete site
    Build {
        /// Publish draft chapters
        #[arg(long)]
        include_drafts: bool,
    },
    /// Validate content and report chapter states without writing anything
    Check {
        /// Report drafts as they would be published with --include-drafts
        #[arg(long)]
        include_drafts: bool,
    },
    /// Print a stock site_config.yaml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Err(err) = logging::init() {
        eprintln!("warning: logging disabled: {err}");
    }

    match cli.command {
        Command::Build { include_drafts } => {
            println!("==> Stage 1: Scanning {}", cli.source.display());
            let manifest = scan::scan(&cli.source)?;
            output::print_scan_output(&manifest, &cli.source);

            init_thread_pool(&manifest.site.processing);
            println!("==> Stage 2: Generating site → {}", cli.output.display());
            let summary = generate::generate(&manifest, &cli.output, BuildOptions { include_drafts })?;
            output::print_build_output(&summary);

            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check { include_drafts } => {
            println!("==> Checking {}", cli.source.display());
            let manifest = scan::scan(&cli.source)?;
            output::print_scan_output(&manifest, &cli.source);

            init_thread_pool(&manifest.site.processing);
            let cache = ChapterCache::build(&manifest, BuildOptions { include_drafts })?;
            println!();
            output::print_check_output(&manifest, &cache);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_yaml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
