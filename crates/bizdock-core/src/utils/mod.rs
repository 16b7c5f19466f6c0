pub mod fs;
pub mod properties;
