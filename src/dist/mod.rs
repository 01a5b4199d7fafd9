pub mod collective;
pub mod collector;
pub mod partition;
