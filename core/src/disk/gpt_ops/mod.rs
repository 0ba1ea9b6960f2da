mod scan;
mod types;

pub use scan::*;
pub use types::*;
