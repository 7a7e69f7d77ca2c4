pub mod help;

pub use help::*;
