use clap::Parser;

use hrag_query::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	hrag_query::run(args).await
}
