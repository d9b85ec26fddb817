use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use val_client::{CourseAliases, RegistryApi, StudioApi};
use val_migrate::batch::{run_batch, BatchOptions, CourseUploader};
use val_migrate::config::MigrateConfig;
use val_migrate::reconcile::Reconciler;
use val_migrate::report;

/// Rewrite course archives so their video descriptors carry registry ids.
#[derive(Parser, Debug)]
#[command(name = "val-migrate", version)]
struct Args {
    /// Course archives (.tar or .tar.gz) to migrate, in order.
    #[arg(required = true, value_name = "ARCHIVE")]
    inputs: Vec<PathBuf>,

    /// Directory for rewritten archives.
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Course id to use instead of reading course.xml.
    #[arg(long)]
    course_id: Option<String>,

    /// Upload each rewritten archive after its report is printed.
    #[arg(long)]
    upload: bool,

    /// Also write the batch results as JSON to this file.
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "val_migrate=info,val_client=info,val_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = MigrateConfig::from_env().expect("invalid migration configuration");

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let registry = CourseAliases::with_aliases(
        RegistryApi::new(config.val_api_url.clone(), config.api_token.clone()),
        config.course_aliases.clone(),
    );
    let studio = StudioApi::new(config.studio_url.clone(), config.api_token.clone())
        .with_chunk_bytes(config.upload_chunk_bytes)
        .with_poll_interval(config.upload_poll_interval);

    tracing::info!(
        courses = args.inputs.len(),
        registry = %config.val_api_url,
        upload = args.upload,
        "Starting migration",
    );

    let reconciler = Reconciler::new(&registry, &config.matcher);
    let options = BatchOptions {
        output_dir: &args.output_dir,
        course_id: args.course_id.as_deref(),
        uploader: args.upload.then_some(&studio as &dyn CourseUploader),
    };
    let mut stdout = std::io::stdout();
    let summary = run_batch(&reconciler, &args.inputs, &options, &mut stdout).await;

    print!("{}", report::render_batch(&summary));

    if let Some(path) = &args.report_json {
        let json = report::to_json(&summary).context("serializing report")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    if summary.aborted || summary.failed() > 0 {
        anyhow::bail!("{} of {} course(s) failed", summary.failed(), summary.courses.len());
    }
    Ok(())
}
