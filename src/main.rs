//! chunksync - chunk-cache based differential file synchronization

use anyhow::bail;
use chunksync::cli::{resolve_config, Cli, Commands};
use chunksync::endpoint::{LocalFile, SourceEndpoint};
use chunksync::hasher::HashAlgorithm;
use chunksync::uri::Location;
use chunksync::{copy, server};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Copy(args) => {
            let config = resolve_config(
                args.config.as_ref(),
                args.chunksize,
                args.hash_algorithm.as_ref(),
                None,
            );
            let algorithm = HashAlgorithm::parse(&config.hash_algorithm)?;

            let source = Location::parse(&args.source)?;
            let target = Location::parse(&args.target)?;
            let Location::Local(target_path) = target else {
                bail!("target file can not be a remote file (http)");
            };

            tracing::info!(
                source = %source,
                target = %target_path.display(),
                algorithm = algorithm.name(),
                chunksize = config.chunksize,
                "Copying file"
            );

            match source {
                Location::Http(base_url) => {
                    copy::copy_http_to_local(base_url, &target_path, algorithm, config.chunksize)
                        .await?;
                }
                Location::Local(source_path) => {
                    if !source_path.exists() {
                        bail!("file does not exist: {}", source_path.display());
                    }
                    copy::copy_local_to_local(
                        &source_path,
                        &target_path,
                        algorithm,
                        config.chunksize,
                    )
                    .await?;
                }
            }

            tracing::info!("File successfully copied");
        }

        Commands::Gencache(args) => {
            let config = resolve_config(
                args.config.as_ref(),
                args.chunksize,
                args.hash_algorithm.as_ref(),
                None,
            );
            let algorithm = HashAlgorithm::parse(&config.hash_algorithm)?;

            if !args.filename.exists() {
                bail!("file does not exist: {}", args.filename.display());
            }

            tracing::info!(
                file = %args.filename.display(),
                algorithm = algorithm.name(),
                chunksize = config.chunksize,
                "Generating cache database"
            );

            let mut source =
                SourceEndpoint::Local(LocalFile::open_source(&args.filename).await?);
            let result = source.build_cache(algorithm, config.chunksize).await;
            let closed = source.close();
            result.and(closed)?;

            tracing::info!("Cache database built");
        }

        Commands::Serve(args) => {
            let config = resolve_config(args.config.as_ref(), None, None, args.listen.as_ref());

            if !args.filename.exists() {
                bail!("file does not exist: {}", args.filename.display());
            }

            server::serve_file(&config.listen, &args.filename).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("chunksync=info"),
        1 => EnvFilter::new("chunksync=debug"),
        2 => EnvFilter::new("chunksync=trace"),
        _ => EnvFilter::new("trace"),
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}
