pub mod allocation_ledger;
pub mod budget;
pub mod classifier;
pub mod clock;
pub mod command;
pub mod config;
pub mod disbursement;
pub mod engine;
pub mod error;
pub mod event;
pub mod money;
pub mod population;
pub mod registry;
pub mod report;
pub mod rng;
pub mod store;
pub mod types;
