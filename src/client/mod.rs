pub mod authority;
pub mod gate;
pub mod publisher;
pub mod queue;
pub mod reconciler;
pub mod state;
pub mod subscriber;
pub mod sync;
pub mod throttle;

pub use authority::{determine_role, resolve_admin_id, RoleAuthority, RoleChange};
pub use gate::{guard, GatedAction, PermissionDenied, PermissionGate};
pub use publisher::{PublishOutcome, Publisher};
pub use queue::{QueueEvent, VideoQueue};
pub use reconciler::{Reconciler, ReconcilerMode, ReconcilerOutcome};
pub use state::{ClientState, CurrentVideo};
pub use subscriber::Subscriber;
pub use sync::{SyncAction, SyncEngine};
pub use throttle::{Throttle, ThrottleDecision};
