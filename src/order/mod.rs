pub mod builder;
pub mod sign;
pub mod types;

pub use builder::OrderBuilder;
pub use types::{MarketAmountKind, Order, OrderTimeInForce, PostOrderBody, SignedOrder};
