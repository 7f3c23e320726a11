//! Session statistics counters

/// Monotonic traffic counters for one session.
///
/// Never reset during the session's lifetime; a fresh
/// [`Session`](crate::network::Session) starts from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Total bytes handed to the socket layer, headers included
    pub bytes_sent: u64,
    /// Total bytes accepted from the socket layer, headers included
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Transport and protocol failures combined
    pub errors: u64,
}

impl NetworkStats {
    pub(crate) fn record_send(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.messages_sent += 1;
    }

    pub(crate) fn record_receive(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.messages_received += 1;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }
}
