pub mod commands;

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rfp_domain::Depth;
use rfp_service::RfpService;
use rfp_storage::qdrant::QdrantStore;

#[derive(Debug, Parser)]
#[command(
	version = rfp_cli::VERSION,
	rename_all = "kebab",
	styles = rfp_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create the collection and its payload indexes if they are missing.
	Init,
	/// Retrieve ranked matches for one question and print them as JSON.
	Query(QueryArgs),
	/// Print the assembled context block for one question.
	Context(QueryArgs),
	/// Index documents from a JSON file, replacing earlier versions of each.
	Ingest {
		#[arg(long, short = 'f', value_name = "FILE")]
		file: PathBuf,
	},
	/// Delete every chunk of one document.
	Delete {
		#[arg(long)]
		tenant: String,
		#[arg(long, value_name = "DOCUMENT_ID")]
		document: String,
	},
	/// Delete every chunk a tenant owns.
	Purge {
		#[arg(long)]
		tenant: String,
		/// Required; the purge cannot be undone.
		#[arg(long)]
		yes: bool,
	},
	/// Rank past documents as pinned-source candidates for one question.
	Sources(SourcesArgs),
}

#[derive(Debug, clap::Args)]
pub struct QueryArgs {
	#[arg(long)]
	pub tenant: String,
	#[arg(long, short = 'q')]
	pub question: String,
	#[arg(long)]
	pub category: Option<String>,
	/// Document searched as its own tier ahead of the rest.
	#[arg(long, value_name = "DOCUMENT_ID")]
	pub pinned_source: Option<String>,
	#[arg(long, default_value = "detailed")]
	pub depth: Depth,
	#[arg(long)]
	pub budget: Option<u32>,
	#[arg(long, value_name = "MS")]
	pub deadline_ms: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct SourcesArgs {
	#[arg(long)]
	pub tenant: String,
	#[arg(long, short = 'q')]
	pub question: String,
	#[arg(long)]
	pub only_won: bool,
	/// Document being answered; left out of the candidates.
	#[arg(long, value_name = "DOCUMENT_ID")]
	pub exclude: Option<String>,
	#[arg(long, default_value_t = rfp_service::DEFAULT_SOURCE_LIMIT)]
	pub limit: u32,
	#[arg(long, value_name = "MS")]
	pub deadline_ms: Option<u64>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = rfp_config::load(&args.config)?;

	init_tracing(&config)?;

	let store = Arc::new(QdrantStore::new(&config.storage.qdrant)?);
	let service = RfpService::new(config, store.clone());

	match args.command {
		Command::Init => commands::init(&store).await,
		Command::Query(query) => commands::query(&service, &query).await,
		Command::Context(query) => commands::context(&service, &query).await,
		Command::Ingest { file } => commands::ingest(&service, &file).await,
		Command::Delete { tenant, document } => commands::delete(&service, &tenant, &document).await,
		Command::Purge { tenant, yes } => commands::purge(&service, &tenant, yes).await,
		Command::Sources(sources) => commands::sources(&service, &sources).await,
	}
}

fn init_tracing(config: &rfp_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	// Stdout is reserved for command output.
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
