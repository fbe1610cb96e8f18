//! Convenience re-exports.

pub use crate::cancellation::{CancellationSource, CancellationToken};
pub use crate::context::RequestContext;
pub use crate::dispatcher::{HandlerRegistry, NotificationHandler, RequestHandler};
pub use crate::outbound::Outbound;
pub use crate::session::{Session, SessionBuilder, SessionConfig};
pub use crate::{SessionError, tracker::TrackerStats};
