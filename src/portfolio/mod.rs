pub mod ledger;

pub use ledger::PortfolioLedger;
