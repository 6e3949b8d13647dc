use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use watermark_bear_core::{
    Area, Config, WatermarkBear,
    init,
    watermark::WatermarkPosition,
    workflow::{LaunchMode, Mode, Screen, Session, Tips},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override the model defined in .env
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the inpainting model defined in .env
    #[arg(long, global = true)]
    image_model: Option<String>,

    /// Write the result preview to this image file
    #[arg(short, long, global = true)]
    preview: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove a watermark from the canned demo video
    Demo {
        /// Area to remove instead of the preselected one, as x,y,width,height
        #[arg(long, value_parser = parse_area)]
        area: Option<Area>,
    },
    /// Remove a watermark from a video
    Remove {
        #[command(flatten)]
        source: Source,

        /// Area to remove instead of the detected one, as x,y,width,height
        #[arg(long, value_parser = parse_area)]
        area: Option<Area>,
    },
    /// Place a watermark image on a video
    Add {
        #[command(flatten)]
        source: Source,

        /// Watermark image
        #[arg(short, long)]
        watermark: Option<PathBuf>,

        #[arg(long, default_value_t = WatermarkPosition::BottomRight)]
        position: WatermarkPosition,

        /// Opacity between 0 and 1
        #[arg(long, default_value_t = 0.8)]
        opacity: f64,

        /// Width in percent of the frame, 5 to 50
        #[arg(long, default_value_t = 20)]
        size: u8,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Source {
    /// Local video file
    #[arg(long)]
    video: Option<PathBuf>,

    /// Video link (nothing is downloaded)
    #[arg(long)]
    link: Option<String>,
}

fn parse_area(raw: &str) -> std::result::Result<Area, String> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("`{}`: {}", v, e)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, width, height] => Ok(Area::new(*x, *y, *width, *height)),
        _ => Err("expected four numbers: x,y,width,height".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    // Load config and override models if specified via CLI
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(m) = cli.model {
        config.model_name = m;
    }
    if let Some(m) = cli.image_model {
        config.image_model_name = m;
    }
    if !config.has_api_key() {
        eprintln!("Warning: GEMINI_API_KEY is not set, AI features are disabled.");
    }

    let app = WatermarkBear::with_config(config).context("Failed to initialize Gemini client")?;

    let mut session = match cli.command {
        Command::Demo { area } => {
            let mut session = app.session(LaunchMode::Demo);
            if let Some(area) = area {
                set_area(&mut session, area)?;
            }
            session.confirm_area()?;
            session
        }
        Command::Remove { source, area } => {
            let mut session = app.session(LaunchMode::Standard);
            session.select_action(Mode::Remove)?;
            open_source(&mut session, &source).await?;

            println!("Detecting watermark...");
            session.settle().await;
            let Screen::SelectArea(step) = session.screen() else {
                bail!("unexpected screen {}", session.screen().name());
            };
            if let Some(warning) = &step.detection_error {
                eprintln!("Warning: {}", warning);
            }
            match step.editor.selection() {
                Some(found) => println!("Detected area: {}", format_area(&found)),
                None => println!("No watermark detected."),
            }
            if session.workflow().audio_watermark() == Some(true) {
                println!("An audio watermark was detected as well.");
            }

            if let Some(area) = area {
                set_area(&mut session, area)?;
            }
            session
                .confirm_area()
                .context("No area to remove. Pass one with --area x,y,width,height")?;
            session
        }
        Command::Add {
            source,
            watermark,
            position,
            opacity,
            size,
        } => {
            let mut session = app.session(LaunchMode::Standard);
            session.select_action(Mode::Add)?;
            open_source(&mut session, &source).await?;
            let editor = session
                .watermark_editor()
                .context("Editor is not available")?;
            editor.set_image(watermark);
            editor.set_position(position);
            editor.set_opacity(opacity);
            editor.set_size(size);
            session.apply_watermark()?;
            session
        }
    };

    run_processing(&mut session).await?;

    let Screen::Result(outcome) = session.screen() else {
        bail!("unexpected screen {}", session.screen().name());
    };
    println!("Done.");
    if outcome.processed_frame.is_none() && outcome.job.mode() == Mode::Remove {
        println!("No processed frame was produced; the preview shows a blurred area.");
    }
    match session.workflow().download_artifact() {
        Some(path) => println!("Download: {}", path.display()),
        None => println!("Nothing to download for this input."),
    }

    if let Some(out) = cli.preview {
        save_preview(&session, &out).await?;
    }

    session.wait_for_tips().await;
    if let Tips::Ready(tips) = session.workflow().tips() {
        println!("\nTips:");
        for tip in tips {
            println!("  - {}", tip);
        }
    }

    Ok(())
}

async fn open_source(session: &mut Session, source: &Source) -> Result<()> {
    match (&source.video, &source.link) {
        (Some(video), _) => session
            .upload_file(video)
            .await
            .with_context(|| format!("Cannot use {}", video.display())),
        (None, Some(link)) => session.submit_link(link).context("Cannot use link"),
        (None, None) => bail!("pass --video or --link"),
    }
}

fn set_area(session: &mut Session, area: Area) -> Result<()> {
    let editor = session
        .area_editor()
        .context("Area selection is not available")?;
    editor.set_selection(Some(area));
    Ok(())
}

/// Pumps background results, printing each new status line.
async fn run_processing(session: &mut Session) -> Result<()> {
    let mut last_message = String::new();
    while session.screen().is_busy() {
        session.next_event().await;
        if let Screen::Processing(processing) = session.screen() {
            if processing.message != last_message {
                println!("[{:>3}%] {}", processing.progress, processing.message);
                last_message = processing.message.clone();
            }
        }
    }

    if let Screen::SelectArea(step) = session.screen() {
        if let Some(error) = &step.processing_error {
            bail!("{}", error);
        }
    }
    Ok(())
}

async fn save_preview(session: &Session, out: &Path) -> Result<()> {
    match session.render_preview().await? {
        Some(preview) => {
            preview
                .save(out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), "preview written");
            println!("Preview: {}", out.display());
        }
        None => println!("No preview for link input."),
    }
    Ok(())
}

fn format_area(area: &Area) -> String {
    format!(
        "x={:.1}% y={:.1}% width={:.1}% height={:.1}%",
        area.x, area.y, area.width, area.height
    )
}
