use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipfs")]
#[command(version)]
#[command(about = "Browse ZIP archives as if they were directories", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipfs list -v legacy.zip                   list entries with recovered names\n  \
  zipfs walk data --load data/pack.zip       walk data/, descending into pack.zip\n  \
  zipfs resolve data/pack.zip/docs -l data/pack.zip   show where a virtual path lives")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for working directories (default: system temp dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the entries of an archive
    List {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// List verbosely
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Walk a directory tree, treating loaded archives as directories
    Walk {
        #[arg(value_name = "TOP")]
        top: String,

        /// Archives to load before walking
        #[arg(short = 'l', long = "load", value_name = "FILE")]
        load: Vec<PathBuf>,

        /// Yield directories after their contents
        #[arg(long)]
        bottom_up: bool,

        /// Descend into symlinked directories
        #[arg(long)]
        follow_links: bool,
    },

    /// Print the on-disk path behind a virtual path
    Resolve {
        #[arg(value_name = "PATH")]
        path: String,

        /// Archives to load before resolving
        #[arg(short = 'l', long = "load", value_name = "FILE")]
        load: Vec<PathBuf>,
    },
}

impl Cli {
    pub fn config(&self) -> crate::Config {
        let config = crate::Config::default();
        match &self.temp_dir {
            Some(dir) => config.temp_dir(dir),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_walk_with_archives() {
        let cli = Cli::parse_from([
            "zipfs", "walk", "data", "-l", "a.zip", "--load", "b.zip", "--bottom-up",
        ]);
        match cli.command {
            Command::Walk {
                top,
                load,
                bottom_up,
                follow_links,
            } => {
                assert_eq!(top, "data");
                assert_eq!(load, [PathBuf::from("a.zip"), PathBuf::from("b.zip")]);
                assert!(bottom_up);
                assert!(!follow_links);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn temp_dir_flows_into_config() {
        let cli = Cli::parse_from(["zipfs", "--temp-dir", "/scratch", "list", "a.zip"]);
        assert_eq!(cli.config().temp_dir, Some(PathBuf::from("/scratch")));
        assert!(Cli::parse_from(["zipfs", "list", "a.zip"]).config().temp_dir.is_none());
    }
}
