//! CLI command implementations.

mod config;
mod list;
mod search;
mod serve;
mod watch;

pub use config::run_config;
pub use list::run_list;
pub use search::run_search;
pub use serve::run_serve;
pub use watch::run_watch;
