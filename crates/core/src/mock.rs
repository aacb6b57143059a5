//! Helpers shared by the in-memory provider backends

use std::sync::atomic::{AtomicU64, Ordering};

use crate::attributes::Attributes;
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Monotonic id source for mock resources.
///
/// Ids are rendered as `{prefix}-{counter:08x}` (`i-0000000a`,
/// `vol-0000000b`), matching the shape of provider ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose first id uses `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start.saturating_sub(1)),
        }
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Next prefixed id
    pub fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{:08x}", self.bump())
    }

    /// Request id in the dashed 8-4-4-4-12 layout
    pub fn request_id(&self) -> String {
        let n = self.bump();
        format!("{:08x}-0000-0000-0000-{n:012x}", n.wrapping_mul(2654435761) & 0xffff_ffff)
    }
}

/// Mock answer with `status`, held to the statuses the request expects
pub fn respond(request: &Request, status: u16, body: Attributes) -> Result<Response> {
    if request.expects_status(status) {
        Ok(Response::new(status, body))
    } else {
        Err(Error::status(&request.expects, status, String::new()))
    }
}

/// Status error a provider would raise for a failed precondition
pub fn reject(request: &Request, status: u16, body: impl Into<String>) -> Error {
    Error::status(&request.expects, status, body)
}
