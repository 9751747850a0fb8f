use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::Action;

use crate::dispatch::ActionService;
use crate::facade::Haptics;

/// `app.*` actions.
pub struct AppService {
    haptics: Arc<dyn Haptics>,
}

impl AppService {
    pub fn new(haptics: Arc<dyn Haptics>) -> Self {
        Self { haptics }
    }
}

#[async_trait]
impl ActionService for AppService {
    fn namespace(&self) -> &'static str {
        "app"
    }

    async fn handle(&self, action: Action) -> Result<Value> {
        match action {
            Action::AppHapticFeedback { style } => {
                self.haptics.impact(style);
                Ok(Value::Null)
            }
            other => Err(BridgeError::UnknownAction(other.name().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitboard_core::protocol::HapticStyle;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<HapticStyle>>);

    impl Haptics for Recorder {
        fn impact(&self, style: HapticStyle) {
            self.0.lock().unwrap().push(style);
        }
    }

    #[tokio::test]
    async fn impact_forwards_style() {
        let rec = Arc::new(Recorder::default());
        let svc = AppService::new(rec.clone());
        for style in [HapticStyle::Medium, HapticStyle::default()] {
            let v = svc.handle(Action::AppHapticFeedback { style }).await.unwrap();
            assert_eq!(v, Value::Null);
        }
        assert_eq!(*rec.0.lock().unwrap(), vec![HapticStyle::Medium, HapticStyle::Light]);
    }
}
