use clap::Parser;
use sitepress::build::build_site;
use sitepress::config::{self, CONFIG_FILENAME};
use sitepress::context::{BuildContext, Mode};
use sitepress::optimize::CommandOptimizer;
use sitepress::output;
use sitepress::script::ScriptEvaluator;
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "sitepress")]
#[command(about = "Static site generator: one template, many pages, embedded scripts")]
#[command(long_about = "\
Static site generator: one template, many pages, embedded scripts

Every file under the site directory is mirrored into release/ or test/.
HTML pages are wrapped in the template at its #content# placeholder; code
between <? and ?> runs first, then @name@ placeholders are filled from cvars.

Project structure:

  config.json            # Optional: cvars, paths, optimizers
  template.html          # Shared page template with #content#
  site/
  ├── index.html         # Page → release/index.html
  ├── blog/post.html     # Page → release/blog/post.html
  ├── img/logo.svg       # Optimized in release mode, copied in test mode
  ├── style.css          # Copied as is
  └── index.html~        # Editor backup, ignored

Modes:
  release   page_root=/ data_root=/data/, assets optimized
  test      page_root/data_root relative to each page, for browsing from disk

Only files whose source or template changed since the last build are
rewritten. Use --force to rebuild everything.

Run 'sitepress --print-config' to see every config option with its default.")]
#[command(version = version_string())]
struct Cli {
    /// Build mode
    #[arg(value_enum, required_unless_present = "print_config")]
    mode: Option<Mode>,

    /// Rebuild every file regardless of modification times
    #[arg(short, long)]
    force: bool,

    /// Project root (holds config.json, the template and the site directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file, relative to the project root
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Print the default config.json and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", config::stock_config_json());
        return Ok(());
    }
    let Some(mode) = cli.mode else {
        return Err("a build mode is required".into());
    };

    let ctx = BuildContext::load(&cli.root, &cli.config, mode, cli.force)?;
    output::print_build_header(&ctx);

    let optimizer = CommandOptimizer::new(ctx.config.optimize.clone());
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = build_site(&ctx, &ScriptEvaluator, &optimizer, Some(tx));
    printer.join().ok();

    let summary = result?;
    output::print_summary(&summary);
    Ok(())
}
