pub mod paper;
pub mod table;

pub use paper::*;
pub use table::*;
