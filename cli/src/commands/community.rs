use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context, Result};
use ecomapper::{read_csv, write_table, CommunitySelector, Criteria};
use log::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::CommunityArgs) -> Result<()> {
    let out_path = args.output.clone().unwrap_or_else(|| PathBuf::from("./communities.csv"));

    info!("[community] loading feature table from {}", args.table.display());
    let mut selector = CommunitySelector::new(read_csv(&args.table, ',')?).with_seed(args.seed);

    if let Some(path) = &args.criteria {
        let file = File::open(path)
            .with_context(|| format!("[community] failed to open {}", path.display()))?;
        let criteria: Criteria = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("[community] failed to parse criteria in {}", path.display()))?;
        selector.select(&criteria)?;
    }

    let mut clustered = selector.cluster(args.k)?.clone();
    info!("[community] writing {} participants to {}", clustered.height(), out_path.display());
    write_table(&mut clustered, &out_path)?;

    if let Some(path) = &args.summary {
        let mut summary = selector.summarize()?;
        info!("[community] writing summary of {} communities to {}", summary.height(), path.display());
        write_table(&mut summary, path)?;
    }

    Ok(())
}
