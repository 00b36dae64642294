//! Shared data models spanning the engine layers.

pub mod bar;
pub mod indicators;
pub mod plan;
pub mod signal;

pub use bar::{Interval, Market, PriceBar};
pub use indicators::{IndicatorFrame, IndicatorSeries, SeriesRef};
pub use plan::{ApplyCounts, SeriesInfo, UpdatePlan};
pub use signal::{Action, CompositeSignal, SignalDirection, SignalEvent, SignalKind};
