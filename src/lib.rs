pub mod constants;
pub mod geodesy;
pub mod error;
pub mod point;
pub mod track;
pub mod config;
pub mod ordering;
pub mod assembler;
pub mod pairing;
pub mod lane;
pub mod coordinator;
pub mod output;
pub mod ingest;
