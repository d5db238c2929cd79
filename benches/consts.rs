use std::sync::LazyLock;

pub const DATA_LINE: &[u8] = b"data: Hello, world!\n";
pub const COMMENT_LINE: &[u8] = b": this is a comment\n";
pub const EVENT_LINE: &[u8] = b"event: update\n";
pub const ID_LINE: &[u8] = b"id: 42\n";
pub const EMPTY_LINE: &[u8] = b"\n";
pub const NO_SPACE_LINE: &[u8] = b"data:value\n";

/// ~1KiB data line with a cat every few characters so the utf-8 check has something to chew on
pub static BIG_DATA_LINE: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut line = String::from("data: ");
    for i in 0..96 {
        line.push_str("abcdefg");
        if i % 3 == 0 {
            line.push('\u{1F431}');
        }
    }
    line.push('\n');
    line.into_bytes()
});

/// `n` rounds of one of every line kind
pub fn generate_one_of_each(n: usize) -> Vec<u8> {
    [DATA_LINE, COMMENT_LINE, EVENT_LINE, ID_LINE, EMPTY_LINE].concat().repeat(n)
}

/// Chat-completion style stream: one small JSON `data:` line per token, blank line between events
pub fn generate_token_stream(n: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..n {
        buf.extend_from_slice(
            format!("data: {{\"index\":{i},\"delta\":{{\"content\":\"tok{i}\"}}}}\n\n").as_bytes(),
        );
    }
    buf.extend_from_slice(b"data: [DONE]\n\n");
    buf
}

/// Only `data:` lines, each carrying multi-byte text, the shape the reader sees from chat-style servers
pub fn generate_multibyte_stream(n: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..n {
        buf.extend_from_slice(format!("data: \u{1F431}{i} caf\u{E9} \u{1F680}\n\n").as_bytes());
    }
    buf
}
