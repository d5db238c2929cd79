pub(crate) const LF: u8 = b'\n';

const BOM_CHAR: char = '\u{FEFF}';
const BOM_LEN: usize = BOM_CHAR.len_utf8();
// bom           = %xFEFF ; U+FEFF BYTE ORDER MARK
pub(crate) const BOM: &[u8; BOM_LEN] = &{
    let mut buf = [0u8; BOM_LEN];
    BOM_CHAR.encode_utf8(&mut buf);
    buf
};

/// Literal prefix of the only line kind we turn into events
pub const DATA_PREFIX: &[u8] = b"data:";

/// Value sent in the `Accept` header by [`EventReader`][crate::EventReader]
pub const EVENT_STREAM_MIME: &str = "text/event-stream";
