//! Decision layer: signal fusion and capital allocation

pub mod allocator;
pub mod arbiter;
pub mod volatility;

pub use allocator::{effective_volatility, CapitalAllocator};
pub use arbiter::SignalArbiter;
pub use volatility::rolling_volatility;
