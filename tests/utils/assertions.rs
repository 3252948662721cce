//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::setup::TestClient;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct FrameAssertion<'a> {
    clients: Vec<&'a mut TestClient>,
}

impl<'a> FrameAssertion<'a> {
    pub fn for_clients(clients: Vec<&'a mut TestClient>) -> Self {
        Self { clients }
    }

    /// Every client receives a frame; all of them are identical. Returns that frame.
    pub async fn received_same_frame(self) -> Value {
        let mut frames = vec![];
        for client in self.clients {
            let frame = client.next_frame().await;
            frames.push((client.name.clone(), frame));
        }

        let (first_name, first) = frames.first().cloned().expect("at least one client");
        for (name, frame) in &frames[1..] {
            assert_eq!(
                frame, &first,
                "{} and {} saw different frames",
                name, first_name
            );
        }
        first
    }

    /// Nobody receives anything within the silence window
    pub async fn received_nothing(self) {
        for client in self.clients {
            let frames = client.drain().await;
            assert!(
                frames.is_empty(),
                "{} should have received nothing, got {:?}",
                client.name,
                frames
            );
        }
    }
}

/// Checks on a single chat message frame
pub struct MessageContent {
    frame: Value,
}

impl MessageContent {
    pub fn new(frame: Value) -> Self {
        Self { frame }
    }

    pub fn id(&self) -> i64 {
        self.frame["id"].as_i64().expect("message frames carry an id")
    }

    pub fn verify_message(self, text: &str, user: &str) -> Self {
        assert_eq!(self.frame["message"], text, "frame {}", self.frame);
        assert_eq!(self.frame["user"], user, "frame {}", self.frame);
        assert!(self.frame["datetime"].is_string(), "frame {}", self.frame);
        self
    }

    pub fn verify_edited(self, edited: bool) -> Self {
        assert_eq!(self.frame["edited"], edited, "frame {}", self.frame);
        self
    }

    pub fn verify_avatar(self, avatar_url: Option<&str>) -> Self {
        match avatar_url {
            Some(url) => assert_eq!(self.frame["avatar_url"], url),
            None => assert!(self.frame["avatar_url"].is_null()),
        }
        self
    }
}

/// Assert a frame has the given `type`
pub fn assert_frame_type(frame: &Value, expected: &str) {
    assert_eq!(
        frame["type"].as_str(),
        Some(expected),
        "expected a {} frame, got {}",
        expected,
        frame
    );
}
