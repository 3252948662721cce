pub mod actions;
pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{assert_frame_type, FrameAssertion, MessageContent};
#[allow(unused_imports)]
pub use mocks::{ChannelSocket, FailingMessageStore, FailingPresenceStore};
#[allow(unused_imports)]
pub use setup::{TestClient, TestSetup, TestSetupBuilder, CALL_LOBBY};
