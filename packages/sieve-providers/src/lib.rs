pub mod command;
pub mod directory;
pub mod prune;
pub mod scan;

mod error;

pub use command::CommandFetcher;
pub use directory::DirectoryFetcher;
pub use error::{Error, Result};
pub use prune::prune_output_root;
