use clap::{Parser, Subcommand};
use narrator_forge::config::Config;
use narrator_forge::error::VideoGenError;
use narrator_forge::orchestrator::{GenerateFlags, Input, Orchestrator};
use narrator_forge::script::parse::validate_script;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "narrator-forge")]
#[command(version, about = "Batch narrated slide video generator")]
#[command(
    long_about = "Turn a URL or an existing script YAML into a narrated, slide-based MP4: \
fetch content, draft a script, synthesize voice, produce slides, and render with Remotion."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full pipeline end-to-end: fetch, script, audio, slides, render
    Generate {
        /// Source URL, or a path to an existing script YAML
        input: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        mcp_config: Option<PathBuf>,
        #[arg(long)]
        scenes: Option<String>,
        #[arg(long)]
        force: bool,
        #[arg(short, long)]
        quiet: bool,
        #[arg(short, long)]
        verbose: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        allow_placeholder: bool,
    },
    /// S1+S2 only: fetch content and draft the script
    Script {
        #[command(subcommand)]
        action: ScriptAction,
    },
    /// S3 only: synthesize narration audio for an existing script
    Audio {
        #[command(subcommand)]
        action: AudioAction,
    },
    /// S4 only: produce slide images for an existing script
    Slides {
        #[command(subcommand)]
        action: SlidesAction,
    },
    /// S5+S6 only: build composition.json and render the MP4
    Video {
        #[command(subcommand)]
        action: VideoAction,
    },
    /// Config file operations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ScriptAction {
    /// Fetch a URL and draft a script (S1+S2)
    Create {
        url: String,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        mcp_config: Option<PathBuf>,
        #[arg(long)]
        force: bool,
        #[arg(short, long)]
        quiet: bool,
        #[arg(short, long)]
        verbose: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate an existing script YAML against a config's personas
    Validate {
        path: PathBuf,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(short, long)]
        quiet: bool,
    },
}

#[derive(Subcommand)]
enum AudioAction {
    Generate {
        script: PathBuf,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long)]
        scenes: Option<String>,
        #[arg(long)]
        speaker_id: Option<u32>,
        #[arg(long)]
        allow_placeholder: bool,
        #[arg(long)]
        force: bool,
        #[arg(short, long)]
        quiet: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SlidesAction {
    Generate {
        script: PathBuf,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long)]
        scenes: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[arg(long)]
        force: bool,
        #[arg(short, long)]
        quiet: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum VideoAction {
    Render {
        script: PathBuf,
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(long)]
        scenes: Option<String>,
        #[arg(long)]
        transition: Option<String>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        progress: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Emit an annotated default config
    Init {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a config YAML
    Validate {
        path: PathBuf,
        #[arg(short, long)]
        quiet: bool,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Hook Ctrl+C to the orchestrator's cooperative-cancellation flag. A second
/// Ctrl+C force-exits rather than waiting for the next stage boundary.
fn wire_cancellation(cancelled: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        if cancelled.load(Ordering::Relaxed) {
            std::process::exit(1);
        }
        eprintln!("\nReceived Ctrl+C, cancelling... (press again to force quit)");
        cancelled.store(true, Ordering::Relaxed);
    })
    .ok();
}

/// An input string is a URL if it looks like one, else an existing script path.
fn parse_input(raw: &str) -> Input {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Input::Url(raw.to_string())
    } else {
        Input::ScriptPath(PathBuf::from(raw))
    }
}

fn load_config(
    path: &std::path::Path,
    api_key: Option<String>,
    mcp_config: Option<&PathBuf>,
) -> narrator_forge::Result<Config> {
    if let Some(mcp) = mcp_config {
        tracing::warn!(
            "--mcp-config {} given, but MCP fetching is an external collaborator this build does not implement; falling back to plain HTTP fetch",
            mcp.display()
        );
    }
    Config::load(path).map(|c| c.with_api_key_override(api_key))
}

fn parse_transition(raw: &str) -> anyhow::Result<narrator_forge::config::TransitionType> {
    use narrator_forge::config::TransitionType;
    match raw.to_lowercase().as_str() {
        "none" => Ok(TransitionType::None),
        "fade" => Ok(TransitionType::Fade),
        "slide" => Ok(TransitionType::Slide),
        "wipe" => Ok(TransitionType::Wipe),
        other => anyhow::bail!("unknown transition type '{other}' (expected none, fade, slide, wipe)"),
    }
}

/// One line naming the stage and input, then the domain error. Full error
/// chain is shown only under `--verbose`.
fn report_error(err: &VideoGenError, verbose: bool) {
    error!("{err}");
    if verbose {
        let mut source = std::error::Error::source(err);
        while let Some(s) = source {
            error!("  caused by: {s}");
            source = s.source();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Generate {
            input,
            output,
            config,
            api_key,
            mcp_config,
            scenes,
            force,
            quiet,
            verbose,
            dry_run,
            allow_placeholder,
        } => {
            init_logging(verbose, quiet);
            let config = load_config(&config, api_key, mcp_config.as_ref())?;
            config.validate()?;

            let flags = GenerateFlags {
                force,
                quiet,
                verbose,
                dry_run,
                allow_placeholder,
            };
            let orchestrator = Orchestrator::new(config);
            wire_cancellation(orchestrator.cancellation_handle());

            match orchestrator.generate(parse_input(&input), scenes.as_deref(), &flags).await {
                Ok(outputs) => {
                    for path in &outputs {
                        if !quiet {
                            info!("rendered {}", path.display());
                        }
                    }
                    if let (Some(dest), Some(first)) = (output, outputs.first()) {
                        std::fs::copy(first, &dest)?;
                    }
                    Ok(())
                }
                Err(e) => {
                    report_error(&e, verbose);
                    Err(e.into())
                }
            }
        }

        Command::Script { action } => match action {
            ScriptAction::Create {
                url,
                config,
                api_key,
                mcp_config,
                force,
                quiet,
                verbose,
                dry_run,
            } => {
                init_logging(verbose, quiet);
                let config = load_config(&config, api_key, mcp_config.as_ref())?;
                config.validate()?;
                let flags = GenerateFlags {
                    force,
                    quiet,
                    verbose,
                    dry_run,
                    allow_placeholder: false,
                };
                let orchestrator = Orchestrator::new(config);
                match orchestrator.create_script(&Input::Url(url), &flags).await {
                    Ok(paths) => {
                        for path in paths {
                            if !quiet {
                                info!("wrote {}", path.display());
                            }
                        }
                        Ok(())
                    }
                    Err(e) => {
                        report_error(&e, verbose);
                        Err(e.into())
                    }
                }
            }
            ScriptAction::Validate { path, config, quiet } => {
                init_logging(false, quiet);
                let config = load_config(&config, None, None)?;
                let contents = std::fs::read_to_string(&path)?;
                let script: narrator_forge::script::VideoScript = serde_yaml::from_str(&contents)?;
                match validate_script(&script, &config.personas) {
                    Ok(()) => {
                        if !quiet {
                            println!("{}: valid ({} sections)", path.display(), script.sections.len());
                        }
                        Ok(())
                    }
                    Err(e) => {
                        report_error(&e, false);
                        Err(e.into())
                    }
                }
            }
        },

        Command::Audio { action } => match action {
            AudioAction::Generate {
                script,
                config,
                scenes,
                speaker_id,
                allow_placeholder,
                force,
                quiet,
                dry_run,
            } => {
                init_logging(false, quiet);
                let config = load_config(&config, None, None)?;
                config.validate()?;
                let flags = GenerateFlags {
                    force,
                    quiet,
                    verbose: false,
                    dry_run,
                    allow_placeholder,
                };
                let orchestrator = Orchestrator::new(config);
                orchestrator
                    .generate_audio_only(&script, scenes.as_deref(), speaker_id, &flags)
                    .await
                    .inspect_err(|e| report_error(e, false))?;
                Ok(())
            }
        },

        Command::Slides { action } => match action {
            SlidesAction::Generate {
                script,
                config,
                scenes,
                language,
                model,
                max_concurrent,
                force,
                quiet,
                dry_run,
            } => {
                init_logging(false, quiet);
                let config = load_config(&config, None, None)?;
                config.validate()?;
                let flags = GenerateFlags {
                    force,
                    quiet,
                    verbose: false,
                    dry_run,
                    allow_placeholder: false,
                };
                let orchestrator = Orchestrator::new(config);
                orchestrator
                    .generate_slides_only(
                        &script,
                        scenes.as_deref(),
                        language.as_deref(),
                        model,
                        max_concurrent,
                        &flags,
                    )
                    .await
                    .inspect_err(|e| report_error(e, false))?;
                Ok(())
            }
        },

        Command::Video { action } => match action {
            VideoAction::Render {
                script,
                config,
                scenes,
                transition,
                fps,
                output,
                progress,
                dry_run,
            } => {
                init_logging(false, !progress);
                let config = load_config(&config, None, None)?;
                config.validate()?;
                let transition_type = transition.map(|t| parse_transition(&t)).transpose()?;
                let flags = GenerateFlags {
                    force: false,
                    quiet: !progress,
                    verbose: false,
                    dry_run,
                    allow_placeholder: false,
                };
                let orchestrator = Orchestrator::new(config);
                let output_path = orchestrator
                    .render_video_only(&script, scenes.as_deref(), transition_type, fps, output, &flags)
                    .await
                    .inspect_err(|e| report_error(e, false))?;
                info!("rendered {}", output_path.display());
                Ok(())
            }
        },

        Command::Config { action } => match action {
            ConfigAction::Init { output } => {
                let yaml = Config::sample().to_yaml()?;
                let annotated = format!(
                    "# narrator-forge project config.\n\
                     # Fill in `project.name`, `personas`, and set OPENROUTER_API_KEY\n\
                     # (or pass --api-key) before running `generate`.\n\n{yaml}"
                );
                match output {
                    Some(path) => {
                        std::fs::write(&path, annotated)?;
                        println!("wrote {}", path.display());
                    }
                    None => print!("{annotated}"),
                }
                Ok(())
            }
            ConfigAction::Validate { path, quiet } => {
                init_logging(false, quiet);
                match Config::load(&path).and_then(|c| c.validate()) {
                    Ok(()) => {
                        if !quiet {
                            println!("{}: valid", path.display());
                        }
                        Ok(())
                    }
                    Err(e) => {
                        report_error(&e, false);
                        Err(e.into())
                    }
                }
            }
        },
    }
}
