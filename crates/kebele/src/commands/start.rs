//! Start command - launches the Kebele server.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context as _, Result};
use clap::Args;
use kebele_server::{AppState, Server, ServerConfig};

use super::{Context, build_guide, build_llm, build_translator, load_config};

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Disable the request gate (overrides config)
    #[arg(long)]
    pub no_rate_limit: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    let mut server_config = ServerConfig::from_settings(&config.server())?;
    if args.port.is_some() || args.bind.is_some() {
        let ip: IpAddr = match args.bind {
            Some(ref bind) => bind
                .parse()
                .with_context(|| format!("invalid bind address '{}'", bind))?,
            None => server_config.bind_address.ip(),
        };
        let port = args.port.unwrap_or(server_config.bind_address.port());
        server_config = server_config.with_bind_address(SocketAddr::new(ip, port));
    }
    if args.no_rate_limit {
        server_config = server_config.with_rate_limiting(false);
    }

    let llm = build_llm(&config)?;
    let guide = build_guide(&config, llm.clone()).await?;
    let translator = build_translator(&config, llm);

    if ctx.verbose {
        eprintln!("LLM: {}", config.llm().provider);
        eprintln!("Embedding: {}", config.embedding().provider);
        eprintln!(
            "Languages: {}",
            translator.supported_languages().join(", ")
        );
    }

    let server = Server::from_state(AppState::new(guide, translator, server_config));
    println!("Kebele listening on http://{}", server.bind_address());

    server.run().await?;
    Ok(())
}
