pub mod channel_dispatcher;
pub mod convolver;
pub mod error;
pub mod error_metrics;
pub mod grid;
pub mod image_helper;
pub mod kernel;
pub mod similarity;
