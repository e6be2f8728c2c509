pub mod db;
pub mod memory;
pub mod pg_store;
pub mod tmdb;
pub mod write_ops;
