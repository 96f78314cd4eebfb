pub mod period;
pub mod provider;
pub mod yahoo;

pub use period::Period;
pub use provider::MarketDataProvider;
