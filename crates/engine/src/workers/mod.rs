//! One worker per strategy: the glue between the pure evaluators in the
//! `strategies` crate and the venue/repository/notification collaborators.

pub mod accumulator;
pub mod buy_wall;
pub mod conditional;
pub mod market_maker;
pub mod price_gap;
pub mod price_keeper;
pub mod sell_liquidity;
pub mod stabilizer;

pub use accumulator::AccumulatorWorker;
pub use buy_wall::BuyWallWorker;
pub use conditional::ConditionalWorker;
pub use market_maker::MarketMakerWorker;
pub use price_gap::PriceGapWorker;
pub use price_keeper::PriceKeeperWorker;
pub use sell_liquidity::SellLiquidityWorker;
pub use stabilizer::StabilizerWorker;

use std::time::Duration;

/// Pause between consecutive single orders in a non-batch loop.
pub(crate) const INTER_ORDER_PAUSE: Duration = Duration::from_millis(500);

/// Pause between consecutive batches.
pub(crate) const INTER_BATCH_PAUSE: Duration = Duration::from_millis(400);
