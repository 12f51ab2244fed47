use clap::Parser;
use std::path::PathBuf;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q       : Quit
  Left / h      : Previous image
  Right / l     : Next image
  Space         : Next image
  Home          : Go to first image
  End           : Go to last image
  r             : Rescan directory / reload current image
  f             : Toggle fullscreen
  z             : Toggle zoom (1:1 / Fit)
";

#[derive(Parser)]
#[command(name = "ivtrack", about = "An image viewer that follows its directory", after_help = HELP_KEYS)]
pub struct Cli {
    /// Image file or directory to open (default: current directory)
    pub path: Option<PathBuf>,

    /// Track symbolically linked files (default: false)
    #[arg(long)]
    pub follow_links: bool,

    /// Initial delay in ms before key-hold repeat begins (default: 500)
    #[arg(long, default_value = "500")]
    pub initial_delay: u64,

    /// Key-hold repeat interval in milliseconds for navigation (default: 35)
    #[arg(long, default_value = "35")]
    pub repeat_delay: u64,
}
