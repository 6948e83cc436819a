use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chakra_lsp_server::ChakraLanguageServer;

#[derive(Parser, Debug)]
#[command(
    name = "chakra-lsp",
    version,
    about = "Language server for Chakra UI component analysis"
)]
struct Args {
    /// Communicate over stdio. This is the only transport and the flag is
    /// accepted for launcher compatibility.
    #[arg(long)]
    stdio: bool,

    /// Write rolling daily log files into this directory instead of stderr.
    #[arg(long, env = "CHAKRA_LSP_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging must stay off stdout, which carries the protocol.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _guard = match args.log_dir {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "chakra-lsp.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    info!("Starting Chakra UI language server");

    let (service, socket) = LspService::build(|client| ChakraLanguageServer::new(client))
        .custom_method(
            "chakra/completionContext",
            ChakraLanguageServer::completion_context_request,
        )
        .finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    info!("Language server stopped");
    Ok(())
}
