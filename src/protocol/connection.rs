use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    message::{DecodeError, Message},
    ACK_MSG, MAX_LINE_LEN, RECORD_DELIMITER,
};

/// A booth session over any byte stream.
///
/// Records are newline terminated. A single read from the stream may hold
/// a fragment of a record or several of them, so everything received is
/// kept in `buffer` until a complete line is available.
pub struct Connection<S> {
    buffer: BytesMut,
    stream: S,
    read_timeout: Option<Duration>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectionErr {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("The record is too long")]
    LineIsTooLong,

    #[error("No data was received for {0:?}")]
    TimedOut(Duration),
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_LINE_LEN),
            stream,
            read_timeout: None,
        }
    }

    /// Closes the connection if a single read waits longer than `timeout`
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Reads the next record from the connection
    ///
    /// - returns None once the peer closed the stream and nothing is left in the buffer
    /// - blank lines are skipped
    /// - a record that fails to decode is returned as an inner error, the connection
    ///   itself stays usable
    pub async fn read_message(
        &mut self,
    ) -> Result<Option<Result<Message, DecodeError>>, ConnectionErr> {
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };

            let line = match std::str::from_utf8(&line) {
                Ok(line) => line,
                Err(err) => return Ok(Some(Err(err.into()))),
            };

            tracing::debug!("received raw: {}", line);
            if line.trim().is_empty() {
                continue;
            }

            return Ok(Some(line.parse()));
        }
    }

    /// Acknowledges a record
    pub async fn send_ack(&mut self) -> tokio::io::Result<()> {
        self.stream.write_all(ACK_MSG).await?;
        self.stream.flush().await
    }

    // returns the next line without its delimiter.
    //
    // whatever is left in the buffer on EOF is treated as one final line.
    // a booth that never sends delimiters gets all its records merged into it.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, ConnectionErr> {
        let mut position = 0;

        loop {
            if let Some(idx) = self.buffer[position..]
                .iter()
                .position(|byte| *byte == RECORD_DELIMITER)
            {
                let idx = position + idx;
                if idx > MAX_LINE_LEN {
                    return Err(ConnectionErr::LineIsTooLong);
                }

                let line = self.buffer[..idx].to_vec();
                self.buffer.advance(idx + 1);
                return Ok(Some(line));
            }

            // everything in the buffer has been checked
            position = self.buffer.len();
            if position > MAX_LINE_LEN {
                return Err(ConnectionErr::LineIsTooLong);
            }

            let rcount = self.read_more().await?;
            if rcount == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                if self.buffer.len() > MAX_LINE_LEN {
                    return Err(ConnectionErr::LineIsTooLong);
                }

                let line = self.buffer.to_vec();
                self.buffer.clear();
                return Ok(Some(line));
            }
        }
    }

    async fn read_more(&mut self) -> Result<usize, ConnectionErr> {
        let read = self.stream.read_buf(&mut self.buffer);
        let rcount = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| ConnectionErr::TimedOut(timeout))??,
            None => read.await?,
        };

        Ok(rcount)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::{Connection, ConnectionErr};
    use crate::protocol::{
        message::{DecodeError, Message},
        MAX_LINE_LEN,
    };

    const ENTRY: &str = "ENTRY;XYZ-123;2024-01-01 10:00:00;7";
    const EXIT: &str = "EXIT;XYZ-123;2024-01-01 10:03:00;5";

    async fn next(conn: &mut Connection<tokio::io::DuplexStream>) -> Message {
        conn.read_message()
            .await
            .unwrap()
            .expect("a record")
            .expect("a valid record")
    }

    #[tokio::test]
    async fn reassembles_fragmented_records() {
        let (mut booth, collector) = tokio::io::duplex(64);
        let mut conn = Connection::new(collector);

        booth.write_all(b"ENTRY;XYZ-1").await.unwrap();
        let read = tokio::spawn(async move {
            let message = next(&mut conn).await;
            (message, conn)
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        booth.write_all(b"23;2024-01-01 10:00:00;7\n").await.unwrap();

        let (message, _conn) = read.await.unwrap();
        assert_eq!(message, ENTRY.parse().unwrap());
    }

    #[tokio::test]
    async fn splits_coalesced_records() {
        let (mut booth, collector) = tokio::io::duplex(256);
        let mut conn = Connection::new(collector);

        booth
            .write_all(format!("{ENTRY}\n\r\n{EXIT}\r\n!DISCONNECT\n").as_bytes())
            .await
            .unwrap();

        assert_eq!(next(&mut conn).await, ENTRY.parse().unwrap());
        assert_eq!(next(&mut conn).await, EXIT.parse().unwrap());
        assert_eq!(next(&mut conn).await, Message::Disconnect);
    }

    #[tokio::test]
    async fn unterminated_record_before_eof() {
        let (mut booth, collector) = tokio::io::duplex(64);
        let mut conn = Connection::new(collector);

        booth.write_all(b"!DISCONNECT").await.unwrap();
        drop(booth);

        assert_eq!(next(&mut conn).await, Message::Disconnect);
        assert!(conn.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unterminated_records_merge_at_eof() {
        let (mut booth, collector) = tokio::io::duplex(256);
        let mut conn = Connection::new(collector);

        booth
            .write_all(format!("{ENTRY}{EXIT}!DISCONNECT").as_bytes())
            .await
            .unwrap();
        drop(booth);

        let merged = conn.read_message().await.unwrap().unwrap();
        assert_eq!(merged, Err(DecodeError::FieldCount(7)));
        assert!(conn.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_records_do_not_end_the_session() {
        let (mut booth, collector) = tokio::io::duplex(256);
        let mut conn = Connection::new(collector);

        booth.write_all(b"GARBAGE\n\xff\xfe\n").await.unwrap();
        booth.write_all(format!("{ENTRY}\n").as_bytes()).await.unwrap();

        let garbage = conn.read_message().await.unwrap().unwrap();
        assert_eq!(garbage, Err(DecodeError::FieldCount(1)));

        let not_utf8 = conn.read_message().await.unwrap().unwrap();
        assert!(matches!(not_utf8, Err(DecodeError::Utf8(_))));

        assert_eq!(next(&mut conn).await, ENTRY.parse().unwrap());
    }

    #[tokio::test]
    async fn rejects_overlong_records() {
        let (mut booth, collector) = tokio::io::duplex(4096);
        let mut conn = Connection::new(collector);

        booth.write_all(&[b'A'; MAX_LINE_LEN + 10]).await.unwrap();

        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(err, ConnectionErr::LineIsTooLong));
    }

    #[tokio::test]
    async fn rejects_overlong_records_split_across_reads() {
        let (mut booth, collector) = tokio::io::duplex(4096);
        let mut conn = Connection::new(collector);

        let plate = "P".repeat(MAX_LINE_LEN);
        let record = format!("ENTRY;{plate};2024-01-01 10:00:00;7\n");
        let (head, tail) = record.as_bytes().split_at(1000);

        booth.write_all(head).await.unwrap();
        let read = tokio::spawn(async move {
            let result = conn.read_message().await;
            (result, conn)
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        booth.write_all(tail).await.unwrap();

        let (result, _conn) = read.await.unwrap();
        assert!(matches!(result, Err(ConnectionErr::LineIsTooLong)));
    }

    #[tokio::test]
    async fn accepts_records_up_to_the_limit() {
        let (mut booth, collector) = tokio::io::duplex(4096);
        let mut conn = Connection::new(collector);

        let prefix = "ENTRY;";
        let suffix = ";2024-01-01 10:00:00;7";
        let plate = "P".repeat(MAX_LINE_LEN - prefix.len() - suffix.len());
        let record = format!("{prefix}{plate}{suffix}");
        assert_eq!(record.len(), MAX_LINE_LEN);

        booth.write_all(format!("{record}\n").as_bytes()).await.unwrap();
        assert_eq!(next(&mut conn).await, record.parse().unwrap());
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let (_booth, collector) = tokio::io::duplex(64);
        let mut conn =
            Connection::new(collector).with_read_timeout(Some(Duration::from_millis(20)));

        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(err, ConnectionErr::TimedOut(_)));
    }

    #[tokio::test]
    async fn acknowledgements() {
        let (mut booth, collector) = tokio::io::duplex(64);
        let mut conn = Connection::new(collector);

        conn.send_ack().await.unwrap();
        conn.send_ack().await.unwrap();

        let mut raw = [0u8; 8];
        booth.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw, b"ACK\nACK\n");
    }
}
