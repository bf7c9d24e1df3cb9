pub mod connection;
pub mod message;

// Sent back after every record, regardless of its content
pub const ACK_MSG: &[u8] = b"ACK\n";

pub const RECORD_DELIMITER: u8 = b'\n';

// Booths never send a record bigger than a single 1024 byte packet
pub const MAX_LINE_LEN: usize = 1024;
