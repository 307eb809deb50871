//! Single-slot command buffer
//!
//! Holds at most one unconsumed command. A command offered while another is
//! pending is dropped; the peer is expected to wait for the response before
//! sending the next one.

use super::types::DEFAULT_COMMAND_CAPACITY;

/// Buffer between the write handler and the application poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    /// Payload of the pending command
    data: Vec<u8>,
    /// Whether `data` is waiting to be consumed
    pending: bool,
    /// Largest accepted payload
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pending: false,
            capacity,
        }
    }

    /// Buffer `payload` unless a command is already pending.
    ///
    /// Returns whether the payload was taken.
    pub fn offer(&mut self, payload: &[u8]) -> bool {
        if self.pending || payload.len() > self.capacity {
            return false;
        }
        self.data.clear();
        self.data.extend_from_slice(payload);
        self.pending = true;
        true
    }

    /// Consume the pending command
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(std::mem::take(&mut self.data))
    }

    /// Pending command, left in place
    pub fn peek(&self) -> Option<&[u8]> {
        self.pending.then_some(self.data.as_slice())
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Length of the pending command, 0 when nothing is pending
    pub fn len(&self) -> usize {
        if self.pending {
            self.data.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pending = false;
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_offer_is_dropped() {
        let mut buffer = CommandBuffer::default();
        assert!(buffer.offer(&[0x01, 0x02]));
        assert!(!buffer.offer(&[0x03]));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.peek(), Some(&[0x01, 0x02][..]));

        assert_eq!(buffer.take(), Some(vec![0x01, 0x02]));
        assert!(!buffer.is_pending());
        assert_eq!(buffer.take(), None);

        assert!(buffer.offer(&[0x03]));
        assert_eq!(buffer.peek(), Some(&[0x03][..]));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut buffer = CommandBuffer::new(4);
        assert!(!buffer.offer(&[0; 5]));
        assert!(buffer.is_empty());
        assert!(buffer.offer(&[0; 4]));
    }
}
