pub mod membership;
pub mod movie;
