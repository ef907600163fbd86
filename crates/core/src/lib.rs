pub mod confirm;
pub mod create2;
pub mod dispatch;
pub mod error;
pub mod gas;
pub mod ledger;
pub mod net;
pub mod nonce;
pub mod orchestrator;
pub mod sender;
pub mod types;
pub mod workload;

pub type Result<T> = std::result::Result<T, error::Error>;
