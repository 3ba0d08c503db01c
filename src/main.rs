use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;

use demo_gallery::app::GalleryApp;
use demo_gallery::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_gallery=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let app = GalleryApp::open(cli.db.as_deref(), cli.gallery_config())?;
    if cli.seed > 0 {
        app.seed(cli.seed)?;
    }

    println!(
        "commands: more, clear, filter <name>, open, capture <photo|video>, pick <id>..., \
         access <status>, scroll <offset> <content> <viewport>, add <photo|video>, \
         delete <id>, quit"
    );
    let mirror = app.run(BufReader::new(tokio::io::stdin())).await?;
    println!("{} item(s) on exit", mirror.items().len());
    Ok(())
}
