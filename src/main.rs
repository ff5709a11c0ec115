use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use shadow_rs::shadow;
use tinyurl_web::{api::HttpUrlApi, cli::Command, links::ShortLinkBuilder, render::Renderer};
use tracing_subscriber::EnvFilter;
use url::Url;

shadow!(build);

#[derive(Parser, Debug)]
#[command(version = build::VERSION, long_version = build::CLAP_LONG_VERSION, about = "", long_about = "")]
struct Args {
    /// Base URL of the shortening backend
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:8080")]
    api_url: Url,
    /// Prefix of the public short links
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://127.0.0.1:3030/")]
    public_base_url: Url,
    #[arg(long, env = "HOST", default_value = "127.0.0.1:3030")]
    host: SocketAddr,
    #[arg(long, env = "TEMPLATES_DIR", default_value = "templates")]
    templates_dir: String,
    #[arg(long, env = "ASSETS_DIR", default_value = "assets")]
    assets_dir: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // construct a subscriber that prints formatted traces to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber)?;

    // reqwest and anything else sharing rustls agree on one provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();
    tracing::debug!("{:?}", &args);

    let api = Arc::new(HttpUrlApi::new(&args.api_url));
    let links = ShortLinkBuilder::new(&args.public_base_url);

    if let Some(command) = args.command {
        tinyurl_web::cli::run(command, api, &links).await?;
        return Ok(());
    }

    let handlebars = Renderer::load_templates(&args.templates_dir)?;
    let renderer = Renderer::new(links, api, handlebars)?;
    let routes = tinyurl_web::routes::get_routes(renderer, args.assets_dir);

    tracing::info!("starting warp server: {}", &args.host);
    tracing::info!("backend: {}", &args.api_url);
    warp::serve(routes)
        .bind(args.host)
        .await
        .graceful(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for CTRL+C: {e}");
            }
        })
        .run()
        .await;

    tracing::info!("gracefully exited.");
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(())
}
