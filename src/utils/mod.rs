pub mod logging;
pub mod text;

pub use text::{find_most_similar, normalize_key, sanitize_folder_name, strip_accents};
