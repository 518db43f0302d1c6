use std::path::PathBuf;

use clap::Parser;

use crate::model::BackgroundPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "asyncmd",
    version,
    about = "Cancellable async command demo"
)]
pub struct Args {
    /// Initial text to reverse
    #[arg(short, long)]
    pub input: Option<String>,

    /// Delay before the reverse completes, in whole seconds
    #[arg(short, long)]
    pub delay: Option<u64>,

    /// When the background loop is stopped
    #[arg(short, long, value_enum)]
    pub background_policy: Option<BackgroundPolicy>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
