//! Shared test helpers.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::ChannelError;
use crate::transport::Channel;

/// In-memory [`Channel`] with scriptable traffic and failure modes.
pub(crate) struct MemoryChannel {
    local: SocketAddr,
    inbound: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    reject_sends: AtomicBool,
    closed: AtomicBool,
}

impl MemoryChannel {
    pub(crate) fn new(local: SocketAddr) -> Self {
        Self {
            local,
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            reject_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a datagram to be returned by the next `try_receive`.
    pub(crate) fn push_inbound(&self, data: &[u8], from: SocketAddr) {
        self.inbound.lock().unwrap().push_back((data.to_vec(), from));
    }

    /// Everything written so far, in order.
    pub(crate) fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every send report `WouldBlock` (a retryable failure).
    pub(crate) fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::Relaxed);
    }
}

impl Channel for MemoryChannel {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    fn try_send(&self, data: &[u8], remote: SocketAddr) -> Result<usize, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if self.reject_sends.load(Ordering::Relaxed) {
            return Err(ChannelError::WouldBlock);
        }
        self.sent.lock().unwrap().push((data.to_vec(), remote));
        Ok(data.len())
    }

    fn try_receive(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        match self.inbound.lock().unwrap().pop_front() {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(Some((len, from)))
            }
            None => Ok(None),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
