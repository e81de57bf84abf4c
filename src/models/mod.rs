// Domain models: entities, windows, raw points

mod entity;
mod series;
mod window;

pub use entity::{Entity, EntitySnapshot};
pub use series::{BandwidthPoint, HitRatePoint, RequestNumPoint, StatusCodePoint, StatusLayer};
pub use window::TimeWindow;
