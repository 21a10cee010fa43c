use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "memeplate", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a captioned image from a template.
    Render(RenderArgs),
    /// Pack caption text into a URL-safe slug.
    Encode(EncodeArgs),
    /// Unpack a slug back into caption text.
    Decode(DecodeArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Template descriptor JSON.
    #[arg(long)]
    template: PathBuf,

    /// Background image (PNG/JPEG/WebP/GIF; multi-frame GIFs stay animated).
    #[arg(long)]
    image: PathBuf,

    /// Output path; the extension picks the format.
    #[arg(long)]
    out: PathBuf,

    /// Caption text, one per region (repeatable). Mutually exclusive with --slug.
    #[arg(long = "caption", conflicts_with = "slug")]
    captions: Vec<String>,

    /// Slug-encoded captions, e.g. `hello_world/second_line`.
    #[arg(long)]
    slug: Option<String>,

    /// Foreground overlay image(s), one per overlay placement in the
    /// descriptor, in order (repeatable).
    #[arg(long = "overlay")]
    overlays: Vec<PathBuf>,

    /// Directory searched for `<family>.ttf` font files.
    #[arg(long, default_value = "fonts")]
    fonts: PathBuf,

    /// Output width in pixels (height follows proportionally unless set).
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Watermark text drawn in the bottom-right corner.
    #[arg(long)]
    watermark: Option<String>,
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Caption text, one argument per region.
    text: Vec<String>,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    slug: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Encode(args) => cmd_encode(args),
        Command::Decode(args) => cmd_decode(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let template = memeplate::load_template(&args.template, &args.image, &args.overlays)?;
    let template_id = template.descriptor.id.clone();

    let catalog = memeplate::InMemoryCatalog::new();
    catalog.insert(template);

    let fonts = memeplate::FontStore::with_search_dir(&args.fonts);

    let ext = args
        .out
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow::anyhow!("output path needs an extension"))?;
    let format = memeplate::OutputFormat::from_extension(ext)?;

    let captions = match &args.slug {
        Some(slug) => memeplate::slug::decode(slug)?,
        None => args.captions.clone(),
    };

    let mut request = memeplate::RenderRequest::new(template_id, captions, format);
    request.width = args.width;
    request.height = args.height;

    let options = memeplate::CompositeOptions {
        watermark: args
            .watermark
            .map(|text| memeplate::Watermark::new(text, "impact")),
    };

    let bytes = memeplate::render_with_options(&request, &catalog, &fonts, &options)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, bytes)
        .with_context(|| format!("write output '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    println!("{}", memeplate::slug::encode(&args.text));
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    for segment in memeplate::slug::decode(&args.slug)? {
        println!("{segment}");
    }
    Ok(())
}
