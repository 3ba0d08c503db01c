use std::path::PathBuf;

use clap::Parser;

use crate::config::{GalleryConfig, DEFAULT_PAGE_SIZE};

#[derive(Parser, Debug)]
#[command(name = "demo-gallery", about = "Browse a media library from the console")]
pub struct Cli {
    /// Library database (default: the user data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Add this many generated assets before starting
    #[arg(long, default_value_t = 0)]
    pub seed: usize,

    /// Assets requested by each `more`
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

impl Cli {
    pub fn gallery_config(&self) -> GalleryConfig {
        GalleryConfig::default().with_page_size(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["demo-gallery"]).unwrap();
        assert!(cli.db.is_none());
        assert_eq!(cli.seed, 0);
        assert_eq!(cli.gallery_config().page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "demo-gallery",
            "--db",
            "/tmp/library.sqlite",
            "--seed",
            "40",
            "--page-size",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/library.sqlite")));
        assert_eq!(cli.seed, 40);
        assert_eq!(cli.gallery_config().page_size, 5);
    }

    #[test]
    fn test_rejects_bad_seed() {
        assert!(Cli::try_parse_from(["demo-gallery", "--seed", "lots"]).is_err());
    }
}
