use anyhow::Result;
use ecomapper::{load_inputs, write_outputs, Config, FeatureFusionPipeline};
use log::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::FuseArgs) -> Result<()> {
    info!("[fuse] reading configuration from {}", args.config.display());
    let config = Config::from_path(&args.config)?;

    let inputs = load_inputs(&config.paths)?;
    let pipeline = FeatureFusionPipeline::new(config.params.clone())?;
    let output = pipeline.run(inputs)?;

    let manifest = write_outputs(&output, &config.output)?;

    let report = &output.report;
    info!(
        "[fuse] {} addresses in, {} out; {} matched and {} unmatched to solar sites; {} features",
        report.addresses, output.features.height(), report.matched, report.unmatched, manifest.features.len(),
    );
    for (level, filled) in &report.impute.by_level {
        info!("[fuse] filled {filled} values from {level} means");
    }

    Ok(())
}
