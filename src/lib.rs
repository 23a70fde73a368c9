pub mod attendance;
pub mod db;
pub mod error;
pub mod ipc;
pub mod ledger;
pub mod store;
pub mod views;
pub mod workflow;
