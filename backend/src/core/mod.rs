pub mod coaching_service;
pub mod relay;

pub use coaching_service::CoachingService;
pub use relay::{ClientEvent, ConnectionState, FrameSink, RelayConnection, RelayFrame, SinkClosed};
