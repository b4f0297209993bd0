use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;

use support_flow::support::server;
use support_flow::support::workflow::{to_mermaid, RoutingTable};
use support_flow::support::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML settings file (defaults to ./support.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route one or more customer queries; each runs independently
    Ask {
        /// The queries to answer
        #[arg(required = true)]
        queries: Vec<String>,
    },
    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the workflow graph as a Mermaid flowchart
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Commands::Graph => {
            print!("{}", to_mermaid(&RoutingTable::default()));
        }
        Commands::Ask { queries } => {
            let service = settings.build_service()?;

            let results = join_all(
                queries
                    .iter()
                    .map(|query| service.run_customer_support(query)),
            )
            .await;
            service.flush_transcripts().await;

            let mut failures = 0;
            for (query, result) in queries.iter().zip(results) {
                println!("Query: {}", query);
                match result {
                    Ok(answer) => {
                        println!("Category: {}", answer.category);
                        println!("Sentiment: {}", answer.sentiment);
                        println!("Response: {}", answer.response);
                    }
                    Err(e) => {
                        failures += 1;
                        println!("Error: {}", e);
                    }
                }
                println!();
            }

            if failures > 0 {
                anyhow::bail!("{} of {} queries failed", failures, queries.len());
            }
        }
        Commands::Serve { port } => {
            let mut server_settings = settings.server.clone();
            if let Some(port) = port {
                server_settings.port = port;
            }

            let service = Arc::new(settings.build_service()?);
            server::serve(service, &server_settings).await?;
        }
    }

    Ok(())
}
