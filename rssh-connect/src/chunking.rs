//! Splits a file's bytes into the `FILE_DATA` chunk sequence described in
//! SPEC_FULL.md §4.6: `seq` starts at 1 and increases monotonically, and the
//! final chunk (and only the final chunk) carries `is_last=true`. Shared by
//! the upload path (`transfer::TransferEngine::upload`) and the download
//! reply path (`dispatcher::send_file_chunks`) so the two can't drift apart.

use uuid::Uuid;

use rssh::protocol::{Message, CHUNK_SIZE};

/// Build the ordered `FileData` messages for `data`. A zero-byte file yields
/// a single chunk with `is_last=true` and empty `data`.
pub(crate) fn file_data_messages(filename: &str, request_id: Uuid, data: &[u8]) -> Vec<Message> {
    let total = data.len() as u64;
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![&[][..]]
    } else {
        data.chunks(CHUNK_SIZE).collect()
    };
    let last = chunks.len() - 1;

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| Message::FileData {
            filename: filename.to_string(),
            seq: index as u32 + 1,
            is_last: index == last,
            file_size: (index == 0).then_some(total),
            data: chunk.to_vec(),
            request_id,
        })
        .collect()
}
