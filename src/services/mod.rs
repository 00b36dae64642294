pub mod market_data;
pub mod yahoo;

pub use market_data::{fetch_symbol, FetchRange, Fetched, MarketDataProvider, RetryPolicy};
pub use yahoo::YahooChartProvider;
