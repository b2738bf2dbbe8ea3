pub mod cancel;
pub mod compare;
pub mod fixture;
pub mod http;
pub mod runner;
