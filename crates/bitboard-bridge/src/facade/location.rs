//! Location facade.
//!
//! Wraps a platform `LocationProvider` with:
//! - a bounded permission handshake (`Idle → AwaitingPermission → Authorized | Denied`)
//! - request coalescing: at most one provider fix in flight, every concurrent
//!   caller attaches to it and settles with the same result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::timeout;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::geohash::{self, MAX_PRECISION};
use bitboard_core::model::{now_millis, Authorization, Position};

use crate::config::{FixedPosition, LocationSection};

/// Platform location services.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    fn authorization(&self) -> Authorization;
    /// Ask the platform for permission. Settles asynchronously.
    fn request_authorization(&self);
    /// One fix. Called at most once at a time by [`Location`].
    async fn request_location(&self) -> Result<Position>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Idle,
    AwaitingPermission,
    Authorized,
    Denied,
}

type Waiter = oneshot::Sender<Result<Position>>;

pub struct Location {
    provider: Arc<dyn LocationProvider>,
    waiters: Arc<Mutex<Vec<Waiter>>>,
    permission: watch::Sender<PermissionState>,
    grace: Duration,
    retries: u32,
    fix_timeout: Option<Duration>,
}

impl Location {
    pub fn new(provider: Arc<dyn LocationProvider>, cfg: &LocationSection) -> Self {
        let (permission, _) = watch::channel(PermissionState::Idle);
        Self {
            provider,
            waiters: Arc::new(Mutex::new(Vec::new())),
            permission,
            grace: Duration::from_millis(cfg.permission_grace_ms),
            retries: cfg.permission_retries,
            fix_timeout: (cfg.fix_timeout_ms > 0).then(|| Duration::from_millis(cfg.fix_timeout_ms)),
        }
    }

    pub fn permission_state(&self) -> PermissionState {
        *self.permission.borrow()
    }

    pub async fn get_current_position(&self) -> Result<Position> {
        self.ensure_authorized().await?;
        self.join_fix().await
    }

    /// Current position as a geohash; `precision` is clamped to `1..=12`.
    pub async fn get_current_geohash(&self, precision: i64) -> Result<String> {
        let precision = precision.clamp(1, MAX_PRECISION as i64) as usize;
        let p = self.get_current_position().await?;
        Ok(geohash::encode(p.latitude, p.longitude, precision))
    }

    async fn ensure_authorized(&self) -> Result<()> {
        let mut cycles = 0;
        loop {
            match self.provider.authorization() {
                Authorization::Authorized => {
                    self.permission.send_replace(PermissionState::Authorized);
                    return Ok(());
                }
                Authorization::Denied | Authorization::Restricted => {
                    self.permission.send_replace(PermissionState::Denied);
                    return Err(BridgeError::PermissionDenied);
                }
                Authorization::NotDetermined if cycles < self.retries => {
                    self.permission.send_replace(PermissionState::AwaitingPermission);
                    self.provider.request_authorization();
                    tokio::time::sleep(self.grace).await;
                    cycles += 1;
                }
                Authorization::NotDetermined => {
                    tracing::warn!(cycles, "location permission never settled");
                    self.permission.send_replace(PermissionState::Idle);
                    return Err(BridgeError::PermissionDenied);
                }
            }
        }
    }

    async fn join_fix(&self) -> Result<Position> {
        let (tx, rx) = oneshot::channel();
        let leader = {
            let mut waiters = self.waiters.lock().await;
            waiters.push(tx);
            waiters.len() == 1
        };

        // The fix runs detached so a caller that goes away cannot strand the rest,
        // and the provider call runs in its own task so a panic still settles
        // the waiters.
        if leader {
            let provider = Arc::clone(&self.provider);
            let waiters = Arc::clone(&self.waiters);
            let limit = self.fix_timeout;
            tokio::spawn(async move {
                let mut fix = tokio::spawn(async move { provider.request_location().await });
                let result = match limit {
                    Some(limit) => match timeout(limit, &mut fix).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            fix.abort();
                            Ok(Err(BridgeError::Timeout(limit.as_millis() as u64)))
                        }
                    },
                    None => fix.await,
                }
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "location provider task failed");
                    Err(BridgeError::Internal(format!("location provider failed: {e}")))
                });

                let settled = std::mem::take(&mut *waiters.lock().await);
                tracing::debug!(waiters = settled.len(), ok = result.is_ok(), "location fix settled");
                for w in settled {
                    let _ = w.send(result.clone());
                }
            });
        }

        rx.await.map_err(|_| BridgeError::LocationUnavailable)?
    }
}

/// Provider serving a configured static fix. Always authorized.
#[derive(Debug, Clone, Default)]
pub struct FixedProvider {
    fix: Option<FixedPosition>,
}

impl FixedProvider {
    pub fn new(fix: Option<FixedPosition>) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl LocationProvider for FixedProvider {
    fn authorization(&self) -> Authorization {
        Authorization::Authorized
    }

    fn request_authorization(&self) {}

    async fn request_location(&self) -> Result<Position> {
        let f = self.fix.as_ref().ok_or(BridgeError::LocationUnavailable)?;
        Ok(Position {
            latitude: f.latitude,
            longitude: f.longitude,
            accuracy: f.accuracy,
            altitude: f.altitude,
            timestamp: now_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Provider whose fixes block until released, counting calls.
    struct GatedProvider {
        auth: std::sync::Mutex<Authorization>,
        grant_on_request: bool,
        calls: AtomicUsize,
        auth_requests: AtomicUsize,
        gate: Notify,
    }

    impl GatedProvider {
        fn new(auth: Authorization) -> Self {
            Self {
                auth: std::sync::Mutex::new(auth),
                grant_on_request: false,
                calls: AtomicUsize::new(0),
                auth_requests: AtomicUsize::new(0),
                gate: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl LocationProvider for GatedProvider {
        fn authorization(&self) -> Authorization {
            *self.auth.lock().unwrap()
        }

        fn request_authorization(&self) {
            self.auth_requests.fetch_add(1, Ordering::SeqCst);
            if self.grant_on_request {
                *self.auth.lock().unwrap() = Authorization::Authorized;
            }
        }

        async fn request_location(&self) -> Result<Position> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(Position {
                latitude: 37.7749,
                longitude: -122.4194,
                accuracy: 5.0,
                altitude: Some(16.0),
                timestamp: 1,
            })
        }
    }

    fn cfg() -> LocationSection {
        LocationSection {
            permission_grace_ms: 10,
            ..LocationSection::default()
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fix() {
        let provider = Arc::new(GatedProvider::new(Authorization::Authorized));
        let loc = Arc::new(Location::new(provider.clone(), &cfg()));

        let a = tokio::spawn({
            let loc = Arc::clone(&loc);
            async move { loc.get_current_position().await }
        });
        let b = tokio::spawn({
            let loc = Arc::clone(&loc);
            async move { loc.get_current_position().await }
        });

        // both callers are parked on the single in-flight fix
        while loc.waiters.lock().await.len() < 2 {
            tokio::task::yield_now().await;
        }
        provider.gate.notify_one();

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a, b);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_never_touches_provider() {
        let provider = Arc::new(GatedProvider::new(Authorization::Denied));
        let loc = Location::new(provider.clone(), &cfg());

        assert_eq!(loc.get_current_position().await.unwrap_err(), BridgeError::PermissionDenied);
        assert_eq!(loc.permission_state(), PermissionState::Denied);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undetermined_retries_once_after_grant() {
        let mut p = GatedProvider::new(Authorization::NotDetermined);
        p.grant_on_request = true;
        let provider = Arc::new(p);
        let loc = Arc::new(Location::new(provider.clone(), &cfg()));

        let task = tokio::spawn({
            let loc = Arc::clone(&loc);
            async move { loc.get_current_geohash(6).await }
        });
        while provider.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        provider.gate.notify_one();

        assert_eq!(task.await.unwrap().unwrap(), "9q8yyk");
        assert_eq!(provider.auth_requests.load(Ordering::SeqCst), 1);
        assert_eq!(loc.permission_state(), PermissionState::Authorized);
    }

    #[tokio::test]
    async fn undetermined_forever_is_bounded() {
        let provider = Arc::new(GatedProvider::new(Authorization::NotDetermined));
        let loc = Location::new(provider.clone(), &cfg());

        assert_eq!(loc.get_current_position().await.unwrap_err(), BridgeError::PermissionDenied);
        assert_eq!(provider.auth_requests.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stuck_fix_times_out() {
        let provider = Arc::new(GatedProvider::new(Authorization::Authorized));
        let cfg = LocationSection {
            fix_timeout_ms: 100,
            ..cfg()
        };
        let loc = Location::new(provider, &cfg);
        assert_eq!(loc.get_current_position().await.unwrap_err(), BridgeError::Timeout(100));
    }

    /// Panics on its first fix, then serves a static one.
    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocationProvider for FlakyProvider {
        fn authorization(&self) -> Authorization {
            Authorization::Authorized
        }

        fn request_authorization(&self) {}

        async fn request_location(&self) -> Result<Position> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("radio driver crashed");
            }
            Ok(Position {
                latitude: 51.5,
                longitude: -0.12,
                accuracy: 10.0,
                altitude: None,
                timestamp: 2,
            })
        }
    }

    #[tokio::test]
    async fn panicking_provider_does_not_wedge_later_fixes() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
        });
        let loc = Location::new(provider.clone(), &cfg());

        let err = loc.get_current_position().await.unwrap_err();
        assert!(matches!(err, BridgeError::Internal(_)), "got {err:?}");
        assert!(loc.waiters.lock().await.is_empty());

        let p = loc.get_current_position().await.unwrap();
        assert_eq!(p.latitude, 51.5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn geohash_precision_is_clamped() {
        let loc = Location::new(
            Arc::new(FixedProvider::new(Some(FixedPosition {
                latitude: 37.7749,
                longitude: -122.4194,
                accuracy: 3.0,
                altitude: None,
            }))),
            &cfg(),
        );
        assert_eq!(loc.get_current_geohash(0).await.unwrap().len(), 1);
        assert_eq!(loc.get_current_geohash(40).await.unwrap().len(), MAX_PRECISION);
    }

    #[tokio::test]
    async fn fixed_provider_without_fix_is_unavailable() {
        let loc = Location::new(Arc::new(FixedProvider::default()), &cfg());
        assert_eq!(loc.get_current_position().await.unwrap_err(), BridgeError::LocationUnavailable);
    }
}
