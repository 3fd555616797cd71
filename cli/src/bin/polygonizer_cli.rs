use clap::{Parser, Subcommand};
use cli::Project;
use color_eyre::eyre::{Result, eyre};
use polygonizer::{ImageFile, ImagePolygonizer, PolygonInfo};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Polygonize every image listed in a project file
    Polygonize {
        /// Path to the TOML or JSON project file
        #[arg(short, long)]
        config: PathBuf,
        /// Override the project's output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a project file with default settings for the given images
    Init {
        /// Path of the project file to create (.toml or .json)
        #[arg(short, long)]
        output: PathBuf,
        /// Where `polygonize` will write its results
        #[arg(long, default_value = "polygons.json")]
        results: String,
        /// Images to include
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the JSON schema of the project file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Polygonize { config, output } => {
            polygonize(config, output.as_deref()).await?;
        }
        Commands::Init {
            output,
            results,
            images,
        } => {
            let project = Project::skeleton(results.clone(), images);
            project.to_file(output)?;
            info!("Wrote project with {} images to {:?}", project.images.len(), output);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&Project::schema())?);
        }
    }

    Ok(())
}

async fn polygonize(config_path: &Path, output_override: Option<&Path>) -> Result<()> {
    let project = Project::from_file(config_path)?;
    project.validate()?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let output_path = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project.output_path(base_dir));

    let mut files = Vec::with_capacity(project.images.len());
    for path in project.image_paths(base_dir) {
        files.push(ImageFile::open(&path).await?);
    }

    let mut polygonizer = match project.pool {
        Some(pool) => ImagePolygonizer::with_config(pool),
        None => ImagePolygonizer::new(),
    }
    .with_tuning(project.tuning.clone());

    let images = polygonizer.import_images(files).await?;
    if images.len() != project.images.len() {
        return Err(eyre!(
            "Decoded {} of {} images",
            images.len(),
            project.images.len()
        ));
    }

    let images: Vec<_> = images
        .into_iter()
        .zip(&project.images)
        .map(|(mut image, entry)| {
            if let Some(label) = &entry.label {
                image.label = label.clone();
            }
            image.with_setting(entry.setting_or_default())
        })
        .collect();

    info!(
        "Polygonizing {} images on up to {} workers",
        images.len(),
        worker_limit(&project)
    );
    let results = polygonizer.polygonize(&images).await?;
    polygonizer.terminate();

    for (image, result) in images.iter().zip(&results) {
        info!(
            "{} ({}x{}): {} polygons, {} points",
            image.label,
            image.width,
            image.height,
            result.polygons.len(),
            result.polygon_point_count()
        );
    }

    write_results(&output_path, &results)?;
    info!("✅ Wrote {} results to {:?}", results.len(), output_path);
    Ok(())
}

fn worker_limit(project: &Project) -> usize {
    project
        .pool
        .map(|pool| pool.max_workers)
        .unwrap_or_else(polygonizer::default_concurrency)
}

fn write_results(path: &Path, results: &[PolygonInfo]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}
