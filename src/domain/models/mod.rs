mod collection_info;
mod document;
mod query;
mod store_config;

pub use collection_info::*;
pub use document::*;
pub use query::*;
pub use store_config::*;
