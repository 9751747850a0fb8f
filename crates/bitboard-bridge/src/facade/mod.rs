//! Native capability facades.
//!
//! Each facade owns its state (permission, peer table, in-flight fix) and is
//! the only writer of it. The dispatcher and router only hold `Arc`s.

pub mod haptics;
pub mod location;
pub mod mesh;

pub use haptics::{Haptics, NoopHaptics, TracingHaptics};
pub use location::{FixedProvider, Location, LocationProvider, PermissionState};
pub use mesh::{
    EventStream, LoopbackTransport, Mesh, MeshFacade, MeshTransport, Submission, TransportEvent,
    LOCAL_SENDER,
};
