//! Command-line surface of the `product-shorts` binary.

use crate::config::{
    Config, DEFAULT_CSV_PATH, DEFAULT_GUIDE_PATH, DEFAULT_PACKS_ROOT, ImageOptions, ImageUrlSource,
    OrganizeOptions, PackGenOptions, RunOptions, TopicOptions,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "product-shorts",
    version,
    about = "Turn a product spreadsheet into short-video prompt packs, scripts and images",
    long_about = "Turn a product spreadsheet into short-video prompt packs, scripts and images.\n\n\
    OPENAI_API_KEY is read from the environment (a local .env is loaded first).\n\n\
    USAGE EXAMPLES:\n  \
      # CSV -> packs -> consolidated results, with reference image download\n  \
      product-shorts pipeline --csv data/batch_items.csv --download-image --skip-existing\n\n  \
      # Scene images for every pack, reusing downloaded photos as references\n  \
      product-shorts images --source-root outputs/finais --output-root outputs/imagens"
)]
pub struct Cli {
    /// JSON config file (API key, models, timeout). Defaults to environment only.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the default working folders
    Init {
        #[arg(long, default_value = ".", value_name = "PATH")]
        base: PathBuf,
    },

    /// Write one prompt pack per spreadsheet row
    MakePacks(PackGenArgs),

    /// Generate and validate every pack's sections
    Run(RunArgs),

    /// Generate scene images for every pack
    Images(ImagesArgs),

    /// make-packs followed by run
    Pipeline {
        /// Guide file prepended to every scenes prompt (optional)
        #[arg(long, value_name = "FILE")]
        guide: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Move results and downloaded images into per-pack folders
    Organize(OrganizeArgs),

    /// Export index.csv summarising every pack
    Index {
        #[arg(long, default_value = DEFAULT_PACKS_ROOT, value_name = "PATH")]
        packs_root: PathBuf,

        /// Where consolidated results were written, if outside the packs
        #[arg(long, visible_alias = "final-root", value_name = "PATH")]
        output_root: Option<PathBuf>,

        #[arg(long, default_value = "outputs/index.csv", value_name = "FILE")]
        out: PathBuf,
    },

    /// Text assets (script, metadata, shot list, asset prompts) for one topic
    Topic(TopicArgs),
}

/// Model overrides shared by the text-generating subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Chat model name
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,
}

impl ModelArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.text_model = model.clone();
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PackGenArgs {
    #[arg(long, default_value = DEFAULT_CSV_PATH, value_name = "FILE")]
    pub csv: PathBuf,

    #[arg(long, default_value = DEFAULT_PACKS_ROOT, value_name = "PATH")]
    pub packs_root: PathBuf,

    /// Guide file prepended to every scenes prompt. Must exist when given.
    #[arg(long, value_name = "FILE")]
    pub guide: Option<PathBuf>,
}

impl PackGenArgs {
    pub fn to_options(&self) -> PackGenOptions {
        pack_gen_options(self.csv.clone(), self.packs_root.clone(), self.guide.clone())
    }
}

/// An explicit guide must exist; the default one is used only when present.
pub fn pack_gen_options(csv_path: PathBuf, packs_root: PathBuf, guide: Option<PathBuf>) -> PackGenOptions {
    let guide_required = guide.is_some();
    PackGenOptions {
        csv_path,
        packs_root,
        guide_path: Some(guide.unwrap_or_else(|| PathBuf::from(DEFAULT_GUIDE_PATH))),
        guide_required,
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliImageSource {
    /// Row N of the spreadsheet feeds pack NNN
    Csv,
    /// URLs pasted into prompt_01_cenas.txt
    #[value(alias = "p01")]
    Scenes,
}

impl From<CliImageSource> for ImageUrlSource {
    fn from(s: CliImageSource) -> Self {
        match s {
            CliImageSource::Csv => Self::Csv,
            CliImageSource::Scenes => Self::Scenes,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = DEFAULT_PACKS_ROOT, value_name = "PATH")]
    pub packs_root: PathBuf,

    /// Write `<pack>.txt` results (and downloaded images) here instead of inside each pack
    #[arg(long, visible_alias = "final-root", value_name = "PATH")]
    pub output_root: Option<PathBuf>,

    /// Skip packs whose consolidated result already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Do not write the intermediate RESPOSTA_*.txt files
    #[arg(long)]
    pub only_final: bool,

    /// Download reference images next to each result
    #[arg(long = "download-image", visible_alias = "download-images")]
    pub download_images: bool,

    /// Where reference image URLs come from [default: scenes for run, csv for pipeline]
    #[arg(long, value_enum)]
    pub images_from: Option<CliImageSource>,

    /// Spreadsheet used for pack generation and csv image URLs
    #[arg(long, visible_alias = "csv-path", default_value = DEFAULT_CSV_PATH, value_name = "FILE")]
    pub csv: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub max_images: usize,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl RunArgs {
    /// `default_source` applies when `--images-from` was not given.
    pub fn to_options(&self, default_source: ImageUrlSource) -> RunOptions {
        RunOptions {
            packs_root: self.packs_root.clone(),
            output_root: self.output_root.clone(),
            skip_existing: self.skip_existing,
            only_final: self.only_final,
            download_images: self.download_images,
            image_source: self.images_from.map_or(default_source, Into::into),
            csv_path: self.csv.clone(),
            max_images: self.max_images,
            ..RunOptions::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    #[arg(long, default_value = DEFAULT_PACKS_ROOT, value_name = "PATH")]
    pub packs_root: PathBuf,

    /// Where downloaded reference images live (`<root>/<pack>/` or flat `<pack>_imgN.*`)
    #[arg(long, visible_alias = "final-root", value_name = "PATH")]
    pub source_root: Option<PathBuf>,

    /// Write images to `<root>/<pack>/` instead of the pack folder
    #[arg(long, value_name = "PATH")]
    pub output_root: Option<PathBuf>,

    /// Regenerate images that already exist
    #[arg(long)]
    pub overwrite: bool,

    #[arg(long, default_value_t = 6)]
    pub max_scenes: usize,

    /// Image size, e.g. 1024x1536
    #[arg(long)]
    pub size: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub image_model: Option<String>,
}

impl ImagesArgs {
    pub fn to_options(&self) -> ImageOptions {
        ImageOptions {
            packs_root: self.packs_root.clone(),
            source_root: self.source_root.clone(),
            output_root: self.output_root.clone(),
            overwrite: self.overwrite,
            max_scenes_per_pack: self.max_scenes.max(1),
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(size) = &self.size {
            config.image_size = size.clone();
        }
        if let Some(model) = &self.image_model {
            config.image_model = model.clone();
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OrganizeArgs {
    #[arg(long, default_value = DEFAULT_PACKS_ROOT, value_name = "PATH")]
    pub packs_root: PathBuf,

    /// Flat folder holding `<pack>.txt` and `<pack>_imgN.*`
    #[arg(long, value_name = "PATH")]
    pub final_root: Option<PathBuf>,

    /// Subfolder for images, e.g. "images"
    #[arg(long)]
    pub images_subdir: Option<String>,

    /// New name (without extension) for the first image, e.g. "thumb"
    #[arg(long)]
    pub rename_first: Option<String>,
}

impl OrganizeArgs {
    pub fn to_options(&self) -> OrganizeOptions {
        OrganizeOptions {
            packs_root: self.packs_root.clone(),
            final_root: self.final_root.clone(),
            images_subdir: self.images_subdir.clone(),
            rename_first: self.rename_first.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TopicArgs {
    #[arg(long)]
    pub topic: String,

    #[arg(long, default_value = "persuasivo")]
    pub style: String,

    /// Target duration in seconds
    #[arg(long, default_value_t = 30)]
    pub duration: u32,

    #[arg(long, default_value = "pt-BR")]
    pub language: String,

    #[arg(long, default_value = "outputs", value_name = "PATH")]
    pub out: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl TopicArgs {
    pub fn to_options(&self) -> TopicOptions {
        TopicOptions {
            topic: self.topic.clone(),
            style: self.style.clone(),
            duration_secs: self.duration,
            language: self.language.clone(),
            output_dir: self.out.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_map_to_options() {
        let cli = Cli::parse_from([
            "product-shorts",
            "run",
            "--final-root",
            "finais",
            "--skip-existing",
            "--only-final",
            "--download-image",
            "--images-from",
            "p01",
            "--max-images",
            "2",
            "--temperature",
            "0.3",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let opts = args.to_options(ImageUrlSource::Csv);
        assert_eq!(opts.output_root, Some(PathBuf::from("finais")));
        assert!(opts.skip_existing && opts.only_final && opts.download_images);
        assert_eq!(opts.image_source, ImageUrlSource::Scenes);
        assert_eq!(opts.max_images, 2);

        let mut cfg = Config::default();
        args.model.apply(&mut cfg);
        assert!((cfg.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.text_model, "gpt-4o-mini");
    }

    #[test]
    fn explicit_guide_is_required_default_is_not() {
        let opts = pack_gen_options("a.csv".into(), "packs".into(), None);
        assert!(!opts.guide_required);
        assert_eq!(opts.guide_path, Some(PathBuf::from(DEFAULT_GUIDE_PATH)));

        let opts = pack_gen_options("a.csv".into(), "packs".into(), Some("g.txt".into()));
        assert!(opts.guide_required);
    }

    #[test]
    fn pipeline_takes_run_flags_and_guide() {
        let cli = Cli::parse_from([
            "product-shorts",
            "-v",
            "pipeline",
            "--csv",
            "itens.csv",
            "--guide",
            "guia.txt",
            "--model",
            "gpt-4o",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Pipeline { guide, run } = cli.command else {
            panic!("expected pipeline");
        };
        assert_eq!(guide, Some(PathBuf::from("guia.txt")));
        assert_eq!(run.csv, PathBuf::from("itens.csv"));
        assert_eq!(run.model.model.as_deref(), Some("gpt-4o"));
        assert_eq!(run.to_options(ImageUrlSource::Csv).image_source, ImageUrlSource::Csv);
    }

    #[test]
    fn run_reads_image_urls_from_scenes_prompt_by_default() {
        let cli = Cli::parse_from(["product-shorts", "run", "--download-image"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.images_from.is_none());
        let opts = args.to_options(ImageUrlSource::Scenes);
        assert_eq!(opts.image_source, ImageUrlSource::Scenes);
        assert!(opts.download_images);
    }
}
