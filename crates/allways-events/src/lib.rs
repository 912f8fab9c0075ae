//! The AllWays status channel.
//!
//! A single logical publish/subscribe bus per deployment carrying semaphore
//! status changes and newly logged emergency and pedestrian requests to
//! every interested observer.
//!
//! ```text
//! StatusChannel::publish ---> broadcast queue ---> Subscription / DeliveryStream
//!                                                    |-- Delivery::Event
//!                                                    +-- Delivery::Resync { missed }
//! ```
//!
//! The channel is a notification side-channel, not the system of record:
//! a subscriber that falls behind gets a resync signal and re-reads the
//! registry. [`StatusCache`] gives receivers idempotent application of
//! status events.

pub mod bus;
pub mod cache;
pub mod error;
pub mod filter;
pub mod subscription;

pub use bus::{DEFAULT_CAPACITY, StatusChannel};
pub use cache::StatusCache;
pub use error::ChannelError;
pub use filter::EventFilter;
pub use subscription::{Delivery, DeliveryStream, Subscription};
