pub mod config;
pub mod driver;
pub mod ir;
pub mod runtime;
