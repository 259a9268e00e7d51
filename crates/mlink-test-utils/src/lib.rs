//! mlink-test-utils: Test infrastructure for mlink.
//!
//! Provides:
//! - MockTransport: scripted in-memory transport for testing without network
//! - SpyNotifier: records alerts for assertions

mod mock_transport;
mod spy_notifier;

pub use mock_transport::{ConnectScript, MockTransport};
pub use spy_notifier::SpyNotifier;
