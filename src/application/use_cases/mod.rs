mod load_directory;
mod store_manager;

pub use load_directory::*;
pub use store_manager::*;
