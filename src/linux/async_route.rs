use crate::linux::{deserialize_res, RouteSocket};
use crate::unix::AsyncSocket;
use crate::{RouteChange, RouteError};
use std::collections::VecDeque;

/// AsyncRouteListener for asynchronously receiving IPv4 route change events.
pub struct AsyncRouteListener {
    list: VecDeque<RouteChange>,
    socket: AsyncSocket<RouteSocket>,
}
impl AsyncRouteListener {
    /// Creates a new AsyncRouteListener. Must be called inside a tokio runtime.
    pub fn new() -> crate::Result<Self> {
        let socket = RouteSocket::subscribe()
            .and_then(AsyncSocket::new)
            .map_err(|source| RouteError::ResourceUnavailable { source })?;
        Ok(Self {
            list: Default::default(),
            socket,
        })
    }
    /// Asynchronously waits for the next route change event.
    pub async fn listen(&mut self) -> crate::Result<RouteChange> {
        if let Some(route) = self.list.pop_front() {
            return Ok(route);
        }
        let mut buf = vec![0; 4096];
        loop {
            let len = self
                .socket
                .read_with(|s| s.recv(&mut buf[..]))
                .await
                .map_err(|source| RouteError::ResourceUnavailable { source })?;
            deserialize_res(
                |route| {
                    self.list.push_back(route);
                },
                &buf[..len],
            )
            .map_err(|source| RouteError::ResourceUnavailable { source })?;
            if let Some(route) = self.list.pop_front() {
                return Ok(route);
            }
        }
    }
}
