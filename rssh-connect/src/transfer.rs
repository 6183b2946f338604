//! Chunked file transfer: an upload is a ready-ack, a run of `FILE_DATA`
//! chunks, then a final ack; a download is a request followed by a stream of
//! `FILE_DATA` chunks with no separate ack.

use uuid::Uuid;

use rssh::protocol::{FileAckStatus, Message, CHUNK_SIZE};
use rssh::Pipe;

use crate::chunking::file_data_messages;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::events::Events;
use std::sync::Arc;

/// Runs file uploads and downloads against a peer.
pub struct TransferEngine<S: Pipe> {
    dispatcher: Dispatcher<S>,
    events: Arc<dyn Events>,
}

impl<S: Pipe> TransferEngine<S> {
    pub fn new(dispatcher: Dispatcher<S>, events: Arc<dyn Events>) -> Self {
        Self { dispatcher, events }
    }

    /// Upload `data` under `filename`, to be stored at `target_path` on the peer.
    pub async fn upload(&self, filename: &str, target_path: &str, data: &[u8]) -> Result<()> {
        let request_id = Uuid::new_v4();
        let ready_rx = self.dispatcher.pending().register(request_id);

        self.dispatcher
            .send(&Message::FileUploadRequest {
                filename: filename.to_string(),
                file_size: data.len() as u64,
                target_path: target_path.to_string(),
                request_id,
            })
            .await?;

        match ready_rx.await.map_err(|_| Error::ConnectionClosed)?? {
            Message::FileAck {
                status: FileAckStatus::Ready,
                ..
            } => {}
            Message::FileAck {
                status,
                message,
                ..
            } => {
                return Err(Error::RequestFailure(format!(
                    "peer declined the upload ({status:?}): {}",
                    message.unwrap_or_default()
                )))
            }
            other => {
                return Err(Error::RequestFailure(format!(
                    "unexpected reply to a file upload request: {other:?}"
                )))
            }
        }

        let total = data.len() as u64;
        let final_rx = self.dispatcher.pending().register(request_id);

        for (index, message) in file_data_messages(filename, request_id, data).into_iter().enumerate() {
            self.dispatcher.send(&message).await?;

            self.events.on_transfer_progress(
                request_id,
                ((index + 1) * CHUNK_SIZE).min(data.len()) as u64,
                Some(total),
            );
        }

        match final_rx.await.map_err(|_| Error::ConnectionClosed)?? {
            Message::FileAck {
                status: FileAckStatus::Completed,
                ..
            } => Ok(()),
            Message::FileAck {
                status,
                message,
                ..
            } => Err(Error::RequestFailure(format!(
                "upload failed ({status:?}): {}",
                message.unwrap_or_default()
            ))),
            other => Err(Error::RequestFailure(format!(
                "unexpected final reply to a file upload: {other:?}"
            ))),
        }
    }

    /// Download `filename` from the peer, returning its full contents.
    pub async fn download(&self, filename: &str) -> Result<Vec<u8>> {
        let request_id = Uuid::new_v4();
        let mut stream = self.dispatcher.streams().register(request_id);

        self.dispatcher
            .send(&Message::FileDownloadRequest {
                filename: filename.to_string(),
                request_id,
            })
            .await?;

        let mut buf = Vec::new();
        let mut total: Option<u64> = None;

        loop {
            let message = stream.recv().await.ok_or(Error::ConnectionClosed)?;

            match message {
                Message::FileData {
                    data,
                    is_last,
                    file_size,
                    ..
                } => {
                    if file_size.is_some() {
                        total = file_size;
                    }
                    buf.extend_from_slice(&data);
                    self.events
                        .on_transfer_progress(request_id, buf.len() as u64, total);

                    if is_last {
                        break;
                    }
                }
                Message::Error { message, .. } => {
                    self.dispatcher.streams().remove(request_id);
                    return Err(Error::RequestFailure(message));
                }
                other => {
                    self.dispatcher.streams().remove(request_id);
                    return Err(Error::RequestFailure(format!(
                        "unexpected message during a file download: {other:?}"
                    )));
                }
            }
        }

        self.dispatcher.streams().remove(request_id);
        Ok(buf)
    }
}
