use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use shoal::config::{BuildContext, Config, Mode};
use shoal::core::Target;
use shoal::motion::{FishScene, Viewport};
use shoal::orchestration::{execute, server, LiveReload, RunSummary, SourceWatcher};
use shoal::tools::{ExternalToolchain, Toolchain};
use shoal::{report, slog, slog_error, Result};

/// Shoal - front-end asset builder with a live-reloading dev server
#[derive(Parser, Debug)]
#[command(name = "shoal")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    NODE_ENV=production  Minify and optimize, fail on lint findings\n    SHOAL_DEBUG=1        Enable debug logging (alternative to --debug)\n    SHOAL_DEBUG=trace    Also log raw tool output")]
pub struct Cli {
    /// Config file (default: shoal.toml or config.json in the current directory)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (writes to ~/.shoal/shoal.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Clean, lint and build everything (default)
    Build,
    /// Compile stylesheets
    BuildStyles,
    /// Bundle the script entry
    BuildScripts,
    /// Render templates to HTML
    BuildViews,
    /// Copy or optimize images
    BuildImages,
    /// Copy or optimize SVG icons
    BuildIcons,
    /// Lint stylesheets and templates
    Lint,
    /// Lint stylesheets
    LintStyles,
    /// Lint templates
    LintViews,
    /// Build, then serve the output and rebuild on change
    Watch,
    /// Run the fish animation headless and print one JSON frame per line
    Swim {
        /// Seconds of animation to simulate
        #[arg(long, default_value_t = 6.0)]
        seconds: f64,

        /// Frames per second
        #[arg(long, default_value_t = 30)]
        fps: u32,

        /// Viewport width
        #[arg(long, default_value_t = 1280.0)]
        width: f64,

        /// Viewport height
        #[arg(long, default_value_t = 720.0)]
        height: f64,

        /// Rendered height of the fish
        #[arg(long, default_value_t = 100.0)]
        fish_height: f64,

        /// Seed for the swim heights (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Command {
    fn target(&self) -> Option<Target> {
        let target = match self {
            Command::Build => Target::Build,
            Command::BuildStyles => Target::BuildStyles,
            Command::BuildScripts => Target::BuildScripts,
            Command::BuildViews => Target::BuildViews,
            Command::BuildImages => Target::BuildImages,
            Command::BuildIcons => Target::BuildIcons,
            Command::Lint => Target::Lint,
            Command::LintStyles => Target::LintStyles,
            Command::LintViews => Target::LintViews,
            Command::Watch => Target::Watch,
            Command::Swim { .. } => return None,
        };
        Some(target)
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Build);
    let name = command.target().map(|t| t.as_str()).unwrap_or("swim");
    shoal::log::init(name, cli.debug);

    if let Command::Swim {
        seconds,
        fps,
        width,
        height,
        fish_height,
        seed,
    } = command
    {
        run_swim(seconds, fps, Viewport::new(width, height), fish_height, seed)?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(target) = command.target() else {
        return Ok(ExitCode::SUCCESS);
    };
    let ctx = Arc::new(load_context(cli.config.as_deref())?);
    shoal::log::attach_project(ctx.mode, &ctx.root);
    report::info(&format!("Using {} mode", ctx.mode));

    let tools: Arc<dyn Toolchain> = Arc::new(ExternalToolchain::new(
        ctx.config.tools.clone(),
        ctx.root.clone(),
    ));

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let summary = execute(&target.composition(), Arc::clone(&ctx), Arc::clone(&tools)).await?;
        if target == Target::Watch {
            run_watch(Arc::clone(&ctx), tools).await?;
        }
        Ok::<RunSummary, shoal::Error>(summary)
    })?;

    Ok(exit_code(target, &summary))
}

/// Load configuration once; everything downstream shares the context.
fn load_context(config_path: Option<&std::path::Path>) -> Result<BuildContext> {
    let root = std::env::current_dir()?;
    // Watch events report canonical paths on some platforms.
    let root = std::fs::canonicalize(&root).unwrap_or(root);
    let config = match config_path {
        Some(path) => Config::load(&root.join(path))?,
        None => Config::discover(&root)?,
    };
    Ok(BuildContext::new(root, config, Mode::from_env()))
}

fn exit_code(target: Target, summary: &RunSummary) -> ExitCode {
    if summary.is_success() {
        report::info(&format!("'{}' finished", target.as_str()));
        return ExitCode::SUCCESS;
    }
    let failed = summary.failed().len();
    let blocked = summary.blocked().len();
    slog_error!(
        "{} failed: {} task(s) failed, {} skipped",
        target.as_str(),
        failed,
        blocked
    );
    report::info(&format!(
        "'{}' failed: {} task(s) failed, {} skipped",
        target.as_str(),
        failed,
        blocked
    ));
    ExitCode::FAILURE
}

/// Serve the output directory and rebuild on change until ctrl-c.
async fn run_watch(ctx: Arc<BuildContext>, tools: Arc<dyn Toolchain>) -> Result<()> {
    let cancel = CancellationToken::new();
    let reload = LiveReload::new();

    let watcher = SourceWatcher::new(Arc::clone(&ctx), tools, reload.clone())?;
    let mut serving = tokio::spawn(server::serve(
        ctx.dist_base(),
        ctx.config.server.port,
        reload,
        cancel.clone(),
    ));
    let mut watching = tokio::spawn(watcher.run(cancel.clone()));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            slog!("ctrl-c received, shutting down");
            signal_cancel.cancel();
        }
    });

    // Whichever stops first takes the other down with it.
    let first = tokio::select! {
        done = &mut serving => {
            cancel.cancel();
            let _ = watching.await;
            done
        }
        done = &mut watching => {
            cancel.cancel();
            let _ = serving.await;
            done
        }
    };
    first.map_err(|e| shoal::Error::TaskJoin(e.to_string()))?
}

fn run_swim(
    seconds: f64,
    fps: u32,
    viewport: Viewport,
    fish_height: f64,
    seed: Option<u64>,
) -> Result<()> {
    let mut scene = match seed {
        Some(seed) => FishScene::seeded(viewport, fish_height, seed),
        None => FishScene::new(viewport, fish_height),
    };
    let fps = fps.max(1);
    let dt = 1.0 / f64::from(fps);
    let frames = (seconds.max(0.0) * f64::from(fps)).round() as u64;

    println!("{}", serde_json::to_string(&scene.frame())?);
    for _ in 0..frames {
        println!("{}", serde_json::to_string(&scene.tick(dt))?);
    }
    Ok(())
}
