use std::collections::HashSet;
use std::sync::Mutex;

/// Tracked desired-subscription state for one channel (market or user).
/// The stream client owns this exclusively; reconnect code takes a
/// consistent snapshot under the lock to replay subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    ids: Mutex<HashSet<String>>,
    custom_feature_enabled: Mutex<bool>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: impl Into<String>) {
        self.ids.lock().expect("subscription lock poisoned").insert(id.into());
    }

    pub fn remove(&self, id: &str) {
        self.ids.lock().expect("subscription lock poisoned").remove(id);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.ids
            .lock()
            .expect("subscription lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn set_custom_feature_enabled(&self, enabled: bool) {
        *self.custom_feature_enabled.lock().expect("lock poisoned") = enabled;
    }

    pub fn custom_feature_enabled(&self) -> bool {
        *self.custom_feature_enabled.lock().expect("lock poisoned")
    }

    pub fn clear(&self) {
        self.ids.lock().expect("subscription lock poisoned").clear();
    }
}
