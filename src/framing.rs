use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::{buffer::InboundBuffer, error::ErrorKind};

/// What a single read from a peer turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    /// This many bytes were appended to the buffer.
    Data(usize),

    /// The peer will not send anything more.
    EndOfStream,

    /// The read failed on garbled input. The session may continue.
    Malformed,
}

/// Do exactly one read from `reader`, appending at the buffer's write cursor.
///
/// A single `read_buf` is awaited, so this is safe to race against other
/// futures in a `select!`: if it loses, no bytes are lost.
pub async fn read_packet<R>(reader: &mut R, buffer: &mut InboundBuffer) -> io::Result<Packet>
where
    R: AsyncRead + Unpin,
{
    match reader.read_buf(buffer.data_mut()).await {
        Ok(0) => Ok(Packet::EndOfStream),
        Ok(n) => {
            trace!(%n, "Packet");
            buffer.count_valid();
            Ok(Packet::Data(n))
        }
        Err(e) if ErrorKind::of_session(&e) == ErrorKind::Malformed => {
            debug!(?e, "Malformed packet");
            buffer.count_invalid();
            Ok(Packet::Malformed)
        }
        Err(e) => Err(e),
    }
}
