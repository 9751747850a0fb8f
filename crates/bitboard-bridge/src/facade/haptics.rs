use bitboard_core::protocol::HapticStyle;

/// Platform impact feedback. Fire-and-forget.
pub trait Haptics: Send + Sync {
    fn impact(&self, style: HapticStyle);
}

/// Host default: no actuator, the impact is only logged.
#[derive(Debug, Default)]
pub struct TracingHaptics;

impl Haptics for TracingHaptics {
    fn impact(&self, style: HapticStyle) {
        tracing::debug!(style = style.as_str(), "haptic impact");
    }
}

/// Used when `haptics.enabled` is off: the action still succeeds, nothing fires.
#[derive(Debug, Default)]
pub struct NoopHaptics;

impl Haptics for NoopHaptics {
    fn impact(&self, _style: HapticStyle) {}
}
