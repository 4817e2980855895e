//! Input sources feeding motion state into the bridge.
//!
//! Current input sources:
//! - `reolink`: Reolink camera CGI API (`GetMdState`)

pub mod reolink;

pub use reolink::ReolinkClient;

use crate::error::Result;
use crate::motion::MotionState;
use async_trait::async_trait;

/// Anything that can report the current motion state on request.
#[async_trait]
pub trait MotionSource: Send + Sync {
    /// Query the current state once. Errors mean "unknown this cycle".
    async fn query_motion_state(&self) -> Result<MotionState>;
}

#[async_trait]
impl<T: MotionSource + ?Sized> MotionSource for std::sync::Arc<T> {
    async fn query_motion_state(&self) -> Result<MotionState> {
        (**self).query_motion_state().await
    }
}
