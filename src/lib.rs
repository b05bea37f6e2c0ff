pub mod adapter;
pub mod analyzers;
pub mod config;
pub mod dashboard;
pub mod episode;
pub mod output;
pub mod parser;
pub mod record;
pub mod source;
pub mod training;
pub mod validation;
