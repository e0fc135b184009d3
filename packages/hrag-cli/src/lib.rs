use clap::{
	Args,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Help colors shared by the hrag binaries.
pub fn styles() -> Styles {
	let emphasis = AnsiColor::Cyan.on_default() | Effects::BOLD;

	Styles::styled()
		.header(emphasis)
		.usage(emphasis)
		.literal(AnsiColor::Green.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Yellow.on_default() | Effects::BOLD)
}

/// Flags that describe one retrieval request.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
	/// Index to search.
	#[arg(long, short = 'i', value_name = "INDEX")]
	pub index: String,
	#[arg(long, short = 'q')]
	pub query: String,
	/// Access group of the caller. Repeat for several groups.
	#[arg(long = "group", value_name = "GROUP")]
	pub groups: Vec<String>,
	/// Keep only results whose URL path lies under this prefix.
	#[arg(long, value_name = "PREFIX")]
	pub url_filter: Option<String>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	/// Order by vector score and bypass the query cache.
	#[arg(long)]
	pub no_rerank: bool,
}
