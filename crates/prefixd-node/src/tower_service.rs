//! Tower `Service` adapter for [`PrefixManagerHandle`].
//!
//! Lets queue-style requests be driven through tower middleware (timeouts,
//! buffering, load shedding) while keeping the manager's ordering.

use std::task::{Context, Poll};

use tower::Service;

use crate::command::PrefixUpdateRequest;
use crate::error::ManagerError;
use crate::handle::{PrefixManagerHandle, Reply};

impl Service<PrefixUpdateRequest> for PrefixManagerHandle {
    type Response = bool;
    type Error = ManagerError;
    type Future = Reply<bool>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.is_closed() {
            Poll::Ready(Err(ManagerError::Stopped))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, req: PrefixUpdateRequest) -> Self::Future {
        self.submit(req)
    }
}
