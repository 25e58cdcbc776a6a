pub mod advice;
pub mod market;
pub mod order;
pub mod state;

pub use advice::*;
pub use market::*;
pub use order::*;
pub use state::*;
