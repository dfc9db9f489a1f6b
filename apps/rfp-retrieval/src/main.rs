use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rfp_retrieval::Args::parse();

	rfp_retrieval::run(args).await
}
