pub mod calendar;
pub mod health;
pub mod init;
pub mod memory_store;
pub mod provider;
pub mod schedule;
pub mod session;
