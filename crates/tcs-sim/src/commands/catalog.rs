use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tcs_exp::{FactorCatalog, DEFAULT_EXCLUDES};

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Directory of `*.toml` treatment files.
    #[arg(long)]
    pub dir: PathBuf,
    /// `all` or a comma separated subset to validate against the catalog.
    #[arg(long, default_value = "all")]
    pub select: String,
    /// File stems to ignore; defaults to the combination template.
    #[arg(long = "exclude", value_name = "STEM")]
    pub exclude: Vec<String>,
}

pub fn run(args: &CatalogArgs) -> Result<(), Box<dyn Error>> {
    let exclude: Vec<String> = if args.exclude.is_empty() {
        DEFAULT_EXCLUDES.iter().map(|name| name.to_string()).collect()
    } else {
        args.exclude.clone()
    };
    let catalog = FactorCatalog::from_dir(&args.dir, &exclude)?;
    for factor in catalog.select(&args.select)? {
        println!("{factor}");
    }
    Ok(())
}
