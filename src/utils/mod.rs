pub mod listing;
pub mod output;
