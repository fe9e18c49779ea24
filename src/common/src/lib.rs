pub mod config;
pub mod inventory;
pub mod ledger;
pub mod model;

pub use inventory::{HttpInventoryGateway, InventoryError, InventoryGateway, StaticInventory};
pub use ledger::Ledger;
pub use model::{AppRecord, AppStatus};
