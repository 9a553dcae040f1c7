use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pagepaint", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a page script as a PNG.
    Render(RenderArgs),
    /// Print what a page script contains.
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input page script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output pixels per user unit (overrides the script).
    #[arg(long)]
    scale: Option<f64>,

    /// Extra rotation in degrees, a multiple of 90.
    #[arg(long, default_value_t = 0)]
    rotation: i32,

    /// `display` (time-sliced) or `print`.
    #[arg(long, default_value = "print")]
    intent: pagepaint::Intent,

    /// Background color `#rrggbb` (overrides the script).
    #[arg(long)]
    background: Option<String>,

    /// Session options JSON (engine and pool tunables).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input page script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Info(args) => cmd_info(args),
    }
}

fn load_opts(config: Option<&PathBuf>) -> anyhow::Result<pagepaint::SessionOpts> {
    let opts = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config '{}'", path.display()))?;
            pagepaint::SessionOpts::from_json(&text)?
        }
        None => pagepaint::SessionOpts::default(),
    };
    Ok(opts.with_env_overrides())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut script = pagepaint::PageScript::from_path(&args.in_path)?;
    if let Some(bg) = args.background {
        script.background = Some(bg);
    }
    let viewport = script.viewport()?.clone_with(|o| {
        let o = o.with_rotation(o.rotation + args.rotation);
        match args.scale {
            Some(s) => o.with_scale(s),
            None => o,
        }
    })?;

    let session = pagepaint::DocumentSession::new(load_opts(args.config.as_ref())?);
    let surface = script.render(&session, viewport, args.intent)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &surface.to_straight_rgba(),
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let script = pagepaint::PageScript::from_path(&args.in_path)?;
    let viewport = script.viewport()?;
    let canvas = viewport.canvas();
    let list = script.operator_list()?;

    println!("page: {}x{} px", canvas.width, canvas.height);
    println!("objects: {}", script.objects.len());
    println!("operators: {}", list.len());
    let mut counts = std::collections::BTreeMap::<String, usize>::new();
    for &code in &list.fn_array {
        let name = pagepaint::OpCode::from_code(code)
            .map_or_else(|| format!("<unknown {code}>"), |op| op.name().to_owned());
        *counts.entry(name).or_default() += 1;
    }
    for (name, n) in counts {
        println!("  {name}: {n}");
    }
    Ok(())
}
