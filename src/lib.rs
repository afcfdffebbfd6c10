pub mod api;
pub mod backend;
pub mod config;
pub mod csv_import;
pub mod error;
pub mod fill;
pub mod images;
pub mod messaging;
pub mod page;
pub mod popup;
pub mod types;
