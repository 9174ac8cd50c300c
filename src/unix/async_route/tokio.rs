use std::io;
use std::os::fd::AsRawFd;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Non-blocking wrapper that parks reads on the tokio reactor.
pub struct AsyncSocket<T: AsRawFd> {
    fd: AsyncFd<T>,
}
impl<T: AsRawFd> AsyncSocket<T> {
    pub fn new(fd: T) -> io::Result<Self> {
        let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
        if flags < 0
            || unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0
        {
            return Err(io::Error::last_os_error());
        }
        Ok(AsyncSocket {
            fd: AsyncFd::with_interest(fd, Interest::READABLE)?,
        })
    }
    pub async fn read_with<R>(
        &mut self,
        mut op: impl FnMut(&mut T) -> io::Result<R>,
    ) -> io::Result<R> {
        self.fd
            .async_io_mut(Interest::READABLE, |fd| op(fd))
            .await
    }
}
