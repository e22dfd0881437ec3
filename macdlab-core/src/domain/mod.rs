//! Domain types for MacdLab

pub mod bar;
pub mod frequency;
pub mod order;

pub use bar::{parse_timestamp, PriceBar, PriceSeries, SeriesError};
pub use frequency::Frequency;
pub use order::{Balances, OrderAck, OrderIntent, OrderSide};

/// Symbol type alias
pub type Symbol = String;
