pub mod api;
pub mod canister;
pub mod client_registry;
pub mod context;
pub mod session;
pub mod static_files;
pub mod utils;
pub mod view;
