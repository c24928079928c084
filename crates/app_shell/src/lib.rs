pub mod activity_log;
pub mod session;

pub use activity_log::{ActivityEntry, ActivityLog};
pub use session::{DesignSession, SegmentReport, ShadowLayer};
