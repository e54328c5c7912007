use bytes::{buf::Limit, BufMut, Bytes, BytesMut};

/// Accumulates bytes until a full frame of a fixed size is available.
///
/// Reads never ask for more than one frame's worth of bytes,
/// so at most one frame plus a partial remainder is ever held.
#[derive(Debug)]
pub struct FrameBuffer {
    data: BytesMut,
    frame_size: usize,
}

impl FrameBuffer {
    /// A new empty buffer for frames of `frame_size` bytes.
    pub fn new(frame_size: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(2 * frame_size),
            frame_size,
        }
    }

    /// The configured frame size.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The write cursor, i.e. how many bytes are buffered.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Nothing buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// At least one complete frame is buffered.
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.frame_size
    }

    /// Room for one read of at most a frame, placed at the write cursor.
    pub fn read_window(&mut self) -> Limit<&mut BytesMut> {
        self.data.reserve(self.frame_size);

        BufMut::limit(&mut self.data, self.frame_size)
    }

    /// Put bytes at the write cursor.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Split off exactly one frame if one is complete.
    /// Any bytes past the frame boundary stay buffered.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        if self.is_full() {
            Some(self.data.split_to(self.frame_size).freeze())
        } else {
            None
        }
    }

    /// Drop everything buffered.
    pub fn reset(&mut self) {
        self.data.clear();
    }
}

/// Read statistics of the input stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    /// Total bytes read. Only ever grows.
    pub bytes_read: u64,

    /// Smoothed size of each read.
    pub avg_read: u64,
}

impl ReadStats {
    /// Account for a read of `n` bytes.
    ///
    /// The average halves towards the latest read each time, so a single
    /// first read of `n` yields `n / 2`.
    pub fn record(&mut self, n: usize) {
        let n = n as u64;

        self.bytes_read += n;
        self.avg_read = (self.avg_read + n) / 2;
    }
}

/// Staging area for bytes read from a network peer.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    data: BytesMut,
    valid_frames: u64,
    invalid_frames: u64,
}

impl InboundBuffer {
    /// A new buffer with room for `capacity` bytes per read.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// The bytes read so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reset the write cursor. Counters are kept.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// How many reads carried data.
    pub fn valid_frames(&self) -> u64 {
        self.valid_frames
    }

    /// How many reads were unreadable.
    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    pub(crate) fn data_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    pub(crate) fn count_valid(&mut self) {
        self.valid_frames += 1;
    }

    pub(crate) fn count_invalid(&mut self) {
        self.invalid_frames += 1;
    }
}
