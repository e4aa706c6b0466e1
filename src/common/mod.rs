pub mod id_cache;
pub mod path;
