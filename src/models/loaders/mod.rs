pub mod toml_loader;

pub use toml_loader::{load_all_batches, load_toml_to_batch};
