#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::{json, Value};
use tokio::time::{timeout, Duration};

use super::setup::TestClient;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

// ============================================================================
// Action Helpers
// ============================================================================

impl TestClient {
    /// Send a raw text frame as the client
    pub fn send_raw(&self, text: &str) {
        self.inbound
            .send(Some(text.to_string()))
            .expect("connection task is gone");
    }

    /// Send a JSON frame as the client
    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    /// Wait for the next frame the server writes to this client
    pub async fn next_frame(&mut self) -> Value {
        let text = timeout(FRAME_TIMEOUT, self.outbound.recv())
            .await
            .unwrap_or_else(|_| panic!("{} received nothing in time", self.name))
            .unwrap_or_else(|| panic!("{} connection closed", self.name));
        serde_json::from_str(&text).expect("server frames are JSON")
    }

    /// Collect exactly `count` frames
    pub async fn next_frames(&mut self, count: usize) -> Vec<Value> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.next_frame().await);
        }
        frames
    }

    /// Whatever arrives within a short window
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut frames = vec![];
        while let Ok(Some(text)) = timeout(SILENCE_WINDOW, self.outbound.recv()).await {
            frames.push(serde_json::from_str(&text).expect("server frames are JSON"));
        }
        frames
    }

    /// Close the client side and wait for the server to finish tearing down
    pub async fn disconnect(self) {
        let _ = self.inbound.send(None);
        timeout(FRAME_TIMEOUT, self.task)
            .await
            .expect("teardown took too long")
            .expect("connection task panicked");
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    /// Send a chat message
    pub fn say(&self, text: &str) {
        self.send(json!({"type": "message", "message": text}));
    }

    pub fn edit(&self, message_id: i64, new_text: &str) {
        self.send(json!({"type": "edit", "message_id": message_id, "new_text": new_text}));
    }

    pub fn delete(&self, message_id: i64) {
        self.send(json!({"type": "delete", "message_id": message_id}));
    }

    /// Start a call to `target` and return the call id
    pub async fn create_call(&mut self, target: &str) -> String {
        self.send(json!({"type": "create-call", "target": target, "from": self.name}));
        let frame = self.next_frame().await;
        assert_eq!(frame["type"], "call-created");
        frame["callId"]
            .as_str()
            .expect("call-created carries a callId")
            .to_string()
    }

    pub fn invite(&self, target: &str, call_id: &str) {
        self.send(json!({
            "type": "call-invite",
            "target": target,
            "from": self.name,
            "callId": call_id,
            "sdp": {"type": "offer", "sdp": "v=0"},
        }));
    }

    /// Send a targeted signaling envelope (ice-candidate, call-answer, call-rejected)
    pub fn signal(&self, kind: &str, target: &str) {
        self.send(json!({
            "type": kind,
            "target": target,
            "from": self.name,
            "candidate": {
                "candidate": "candidate:0 1 UDP 2122252543 10.0.0.1 4000 typ host",
                "sdpMid": "0",
            },
        }));
    }

    pub fn participant_joined(&self) {
        self.send(json!({"type": "participant-joined", "from": self.name}));
    }

    pub fn participant_left(&self) {
        self.send(json!({"type": "participant-left", "from": self.name}));
    }

    /// Ask for the roster and return the sorted usernames
    pub async fn participants(&mut self) -> Vec<String> {
        self.send(json!({"type": "get-participants"}));
        let frame = self.next_frame().await;
        assert_eq!(frame["type"], "participants", "unexpected reply {}", frame);
        serde_json::from_value(frame["participants"].clone()).expect("participants is a list")
    }
}
