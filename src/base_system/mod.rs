pub mod book_ref;
pub mod config;
pub mod context;
pub mod file_cleaner;
pub mod logging;
