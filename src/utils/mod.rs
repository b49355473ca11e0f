pub mod export;
pub mod summary;
pub mod plot;
pub mod realtime;
