pub mod collect;
pub mod db_counts;
pub mod ingest;
