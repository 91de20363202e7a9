use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Show the collection or index snapshot
    Info,

    Search {
        query: String,

        #[arg(short, long, default_value = "3")]
        num: usize,

        /// Metadata equality filter, e.g. --where type=text_file (repeatable)
        #[arg(short = 'w', long = "where", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    Add {
        text: String,

        /// Document id (a random UUID if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Load every matching file in a directory, one document per file
    Load {
        dir: String,

        #[arg(short, long, default_value = "*.txt")]
        pattern: String,
    },

    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Create the Pinecone index if it does not exist
    CreateIndex {
        #[arg(long)]
        cloud: Option<String>,

        #[arg(long)]
        region: Option<String>,

        /// Hosted embedding model the index is bound to
        #[arg(long)]
        model: Option<String>,
    },
}
