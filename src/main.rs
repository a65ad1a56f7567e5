use anyhow::Result;
use clap::Parser;
use product_shorts::api::{OpenAiClient, TextGenerator};
use product_shorts::cli::{Cli, Commands, ModelArgs, pack_gen_options};
use product_shorts::config::{Config, ImageUrlSource};
use product_shorts::images::ImagePipeline;
use product_shorts::processor::PackProcessor;
use product_shorts::{index, init, organize, packgen, topic};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config_path = cli.config.as_deref();
    match &cli.command {
        Commands::Init { base } => {
            init::ensure_directories(base, &[]).await?;
        }
        Commands::MakePacks(args) => {
            packgen::generate_packs(&args.to_options()).await?;
        }
        Commands::Run(args) => {
            let client = text_client(config_path, &args.model).await?;
            PackProcessor::new(&client, args.to_options(ImageUrlSource::Scenes))
                .run()
                .await?;
        }
        Commands::Pipeline { guide, run } => {
            // Key first: a missing key must not leave half a pipeline behind.
            let client = text_client(config_path, &run.model).await?;
            let packs = pack_gen_options(run.csv.clone(), run.packs_root.clone(), guide.clone());
            packgen::generate_packs(&packs).await?;
            PackProcessor::new(&client, run.to_options(ImageUrlSource::Csv))
                .run()
                .await?;
        }
        Commands::Images(args) => {
            let mut config = load_config(config_path).await?;
            args.apply(&mut config);
            let client = OpenAiClient::new(&config)?;
            ImagePipeline::new(&client, args.to_options()).run().await?;
        }
        Commands::Organize(args) => {
            organize::organize(&args.to_options()).await?;
        }
        Commands::Index {
            packs_root,
            output_root,
            out,
        } => {
            index::export_index(packs_root, output_root.as_deref(), out).await?;
        }
        Commands::Topic(args) => {
            let client = match text_client(config_path, &args.model).await {
                Ok(client) => Some(client),
                Err(err) => {
                    tracing::warn!("{:#}; using the built-in script", err);
                    None
                }
            };
            let generator = client.as_ref().map(|c| c as &dyn TextGenerator);
            topic::run_topic(generator, &args.to_options()).await?;
        }
    }
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).await,
        None => Ok(Config::from_env()?),
    }
}

async fn text_client(path: Option<&Path>, overrides: &ModelArgs) -> Result<OpenAiClient> {
    let mut config = load_config(path).await?;
    overrides.apply(&mut config);
    config.validate()?;
    tracing::info!("Text model: {} (temperature {})", config.text_model, config.temperature);
    Ok(OpenAiClient::new(&config)?)
}

fn setup_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "product_shorts=info",
        1 => "product_shorts=debug",
        _ => "product_shorts=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
