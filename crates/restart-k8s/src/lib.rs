pub mod client;
pub mod restart;
