pub mod error;
pub mod id_range;
pub mod reserved_ids;
