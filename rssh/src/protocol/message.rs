//! The bespoke message set exchanged over the codec, and its wire encoding.

use uuid::Uuid;

use super::wire::{Reader, Writer};
use crate::error::{Error, Result};

/// The maximum size of a single [`Message::FileData`] chunk.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// `AUTH_REQUEST.auth_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Password,
    PublicKey,
    Dual,
}

impl AuthType {
    fn to_tag(self) -> u8 {
        match self {
            AuthType::Password => 0,
            AuthType::PublicKey => 1,
            AuthType::Dual => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(AuthType::Password),
            1 => Ok(AuthType::PublicKey),
            2 => Ok(AuthType::Dual),
            other => Err(Error::ProtocolError(format!(
                "unknown auth_type tag {other}"
            ))),
        }
    }
}

/// `PORT_FORWARD_REQUEST.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortForwardKind {
    /// `L:lport -> rhost:rport`: the client listens and forwards to the server side.
    Local,
    /// `R:rport -> lhost:lport`: the server listens and forwards to the client side.
    Remote,
}

impl PortForwardKind {
    fn to_tag(self) -> u8 {
        match self {
            PortForwardKind::Local => 0,
            PortForwardKind::Remote => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PortForwardKind::Local),
            1 => Ok(PortForwardKind::Remote),
            other => Err(Error::ProtocolError(format!(
                "unknown port forward type tag {other}"
            ))),
        }
    }
}

/// `FILE_ACK.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAckStatus {
    Ready,
    Completed,
    Failed,
}

impl FileAckStatus {
    fn to_tag(self) -> u8 {
        match self {
            FileAckStatus::Ready => 0,
            FileAckStatus::Completed => 1,
            FileAckStatus::Failed => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FileAckStatus::Ready),
            1 => Ok(FileAckStatus::Completed),
            2 => Ok(FileAckStatus::Failed),
            other => Err(Error::ProtocolError(format!(
                "unknown file ack status tag {other}"
            ))),
        }
    }
}

/// The exhaustive set of messages exchanged over a session.
///
/// Exactly one variant occupies a frame's body; an unrecognized type tag is
/// a fatal [`Error::ProtocolError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    KexInit {
        dh_pub: Vec<u8>,
        client_id: String,
    },
    KexReply {
        dh_pub: Vec<u8>,
        server_rsa_pub: String,
        signature: Vec<u8>,
        session_id: String,
    },
    AuthRequest {
        username: String,
        auth_type: AuthType,
        password: Option<String>,
        public_key: Option<String>,
        signature: Option<Vec<u8>>,
    },
    AuthSuccess,
    AuthFailure {
        reason: String,
    },
    ServiceRequest {
        service: String,
    },
    ServiceAccept {
        service: String,
    },
    ShellCommand {
        command: String,
        cwd: String,
        request_id: Uuid,
    },
    ShellResult {
        stdout: String,
        stderr: String,
        exit_code: i32,
        cwd: String,
        request_id: Uuid,
    },
    FileUploadRequest {
        filename: String,
        file_size: u64,
        target_path: String,
        request_id: Uuid,
    },
    FileDownloadRequest {
        filename: String,
        request_id: Uuid,
    },
    FileData {
        filename: String,
        seq: u32,
        is_last: bool,
        file_size: Option<u64>,
        data: Vec<u8>,
        request_id: Uuid,
    },
    FileAck {
        request_id: Uuid,
        status: FileAckStatus,
        message: Option<String>,
    },
    PortForwardRequest {
        kind: PortForwardKind,
        source_port: u16,
        dest_host: String,
        dest_port: u16,
        connection_id: Uuid,
    },
    PortForwardAccept {
        connection_id: Uuid,
        success: bool,
    },
    PortForwardData {
        connection_id: Uuid,
        data: Vec<u8>,
    },
    PortForwardClose {
        connection_id: Uuid,
    },
    Disconnect {
        reason: String,
    },
    Error {
        request_id: Option<Uuid>,
        message: String,
    },
    ReloadUsers,
}

// Type tags. Stable and never reordered: a future variant is appended, never inserted.
mod tag {
    pub const KEX_INIT: u16 = 1;
    pub const KEX_REPLY: u16 = 2;
    pub const AUTH_REQUEST: u16 = 3;
    pub const AUTH_SUCCESS: u16 = 4;
    pub const AUTH_FAILURE: u16 = 5;
    pub const SERVICE_REQUEST: u16 = 6;
    pub const SERVICE_ACCEPT: u16 = 7;
    pub const SHELL_COMMAND: u16 = 8;
    pub const SHELL_RESULT: u16 = 9;
    pub const FILE_UPLOAD_REQUEST: u16 = 10;
    pub const FILE_DOWNLOAD_REQUEST: u16 = 11;
    pub const FILE_DATA: u16 = 12;
    pub const FILE_ACK: u16 = 13;
    pub const PORT_FORWARD_REQUEST: u16 = 14;
    pub const PORT_FORWARD_ACCEPT: u16 = 15;
    pub const PORT_FORWARD_DATA: u16 = 16;
    pub const PORT_FORWARD_CLOSE: u16 = 17;
    pub const DISCONNECT: u16 = 18;
    pub const ERROR: u16 = 19;
    pub const RELOAD_USERS: u16 = 20;
}

fn write_uuid(writer: &mut Writer, id: &Uuid) {
    writer.write_str(&id.to_string());
}

fn read_uuid(reader: &mut Reader) -> Result<Uuid> {
    Uuid::parse_str(&reader.read_str()?)
        .map_err(|_| Error::ProtocolError("field is not a valid UUID".into()))
}

impl Message {
    /// Encode this message, including its leading type tag, to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();

        match self {
            Message::KexInit { dh_pub, client_id } => {
                w.write_u16(tag::KEX_INIT);
                w.write_bytes(dh_pub);
                w.write_str(client_id);
            }
            Message::KexReply {
                dh_pub,
                server_rsa_pub,
                signature,
                session_id,
            } => {
                w.write_u16(tag::KEX_REPLY);
                w.write_bytes(dh_pub);
                w.write_str(server_rsa_pub);
                w.write_bytes(signature);
                w.write_str(session_id);
            }
            Message::AuthRequest {
                username,
                auth_type,
                password,
                public_key,
                signature,
            } => {
                w.write_u16(tag::AUTH_REQUEST);
                w.write_str(username);
                w.write_u8(auth_type.to_tag());
                w.write_option(password, |w, v| w.write_str(v));
                w.write_option(public_key, |w, v| w.write_str(v));
                w.write_option(signature, |w, v| w.write_bytes(v));
            }
            Message::AuthSuccess => {
                w.write_u16(tag::AUTH_SUCCESS);
            }
            Message::AuthFailure { reason } => {
                w.write_u16(tag::AUTH_FAILURE);
                w.write_str(reason);
            }
            Message::ServiceRequest { service } => {
                w.write_u16(tag::SERVICE_REQUEST);
                w.write_str(service);
            }
            Message::ServiceAccept { service } => {
                w.write_u16(tag::SERVICE_ACCEPT);
                w.write_str(service);
            }
            Message::ShellCommand {
                command,
                cwd,
                request_id,
            } => {
                w.write_u16(tag::SHELL_COMMAND);
                w.write_str(command);
                w.write_str(cwd);
                write_uuid(&mut w, request_id);
            }
            Message::ShellResult {
                stdout,
                stderr,
                exit_code,
                cwd,
                request_id,
            } => {
                w.write_u16(tag::SHELL_RESULT);
                w.write_str(stdout);
                w.write_str(stderr);
                w.write_i32(*exit_code);
                w.write_str(cwd);
                write_uuid(&mut w, request_id);
            }
            Message::FileUploadRequest {
                filename,
                file_size,
                target_path,
                request_id,
            } => {
                w.write_u16(tag::FILE_UPLOAD_REQUEST);
                w.write_str(filename);
                w.write_u64(*file_size);
                w.write_str(target_path);
                write_uuid(&mut w, request_id);
            }
            Message::FileDownloadRequest {
                filename,
                request_id,
            } => {
                w.write_u16(tag::FILE_DOWNLOAD_REQUEST);
                w.write_str(filename);
                write_uuid(&mut w, request_id);
            }
            Message::FileData {
                filename,
                seq,
                is_last,
                file_size,
                data,
                request_id,
            } => {
                w.write_u16(tag::FILE_DATA);
                w.write_str(filename);
                w.write_u32(*seq);
                w.write_bool(*is_last);
                w.write_option(file_size, |w, v| w.write_u64(*v));
                w.write_bytes(data);
                write_uuid(&mut w, request_id);
            }
            Message::FileAck {
                request_id,
                status,
                message,
            } => {
                w.write_u16(tag::FILE_ACK);
                write_uuid(&mut w, request_id);
                w.write_u8(status.to_tag());
                w.write_option(message, |w, v| w.write_str(v));
            }
            Message::PortForwardRequest {
                kind,
                source_port,
                dest_host,
                dest_port,
                connection_id,
            } => {
                w.write_u16(tag::PORT_FORWARD_REQUEST);
                w.write_u8(kind.to_tag());
                w.write_u16(*source_port);
                w.write_str(dest_host);
                w.write_u16(*dest_port);
                write_uuid(&mut w, connection_id);
            }
            Message::PortForwardAccept {
                connection_id,
                success,
            } => {
                w.write_u16(tag::PORT_FORWARD_ACCEPT);
                write_uuid(&mut w, connection_id);
                w.write_bool(*success);
            }
            Message::PortForwardData { connection_id, data } => {
                w.write_u16(tag::PORT_FORWARD_DATA);
                write_uuid(&mut w, connection_id);
                w.write_bytes(data);
            }
            Message::PortForwardClose { connection_id } => {
                w.write_u16(tag::PORT_FORWARD_CLOSE);
                write_uuid(&mut w, connection_id);
            }
            Message::Disconnect { reason } => {
                w.write_u16(tag::DISCONNECT);
                w.write_str(reason);
            }
            Message::Error { request_id, message } => {
                w.write_u16(tag::ERROR);
                w.write_option(request_id, |w, v| write_uuid(w, v));
                w.write_str(message);
            }
            Message::ReloadUsers => {
                w.write_u16(tag::RELOAD_USERS);
            }
        }

        w.into_bytes()
    }

    /// Decode a message, including its leading type tag, from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let type_tag = r.read_u16()?;

        let message = match type_tag {
            tag::KEX_INIT => Message::KexInit {
                dh_pub: r.read_bytes()?,
                client_id: r.read_str()?,
            },
            tag::KEX_REPLY => Message::KexReply {
                dh_pub: r.read_bytes()?,
                server_rsa_pub: r.read_str()?,
                signature: r.read_bytes()?,
                session_id: r.read_str()?,
            },
            tag::AUTH_REQUEST => Message::AuthRequest {
                username: r.read_str()?,
                auth_type: AuthType::from_tag(r.read_u8()?)?,
                password: r.read_option(|r| r.read_str())?,
                public_key: r.read_option(|r| r.read_str())?,
                signature: r.read_option(|r| r.read_bytes())?,
            },
            tag::AUTH_SUCCESS => Message::AuthSuccess,
            tag::AUTH_FAILURE => Message::AuthFailure {
                reason: r.read_str()?,
            },
            tag::SERVICE_REQUEST => Message::ServiceRequest {
                service: r.read_str()?,
            },
            tag::SERVICE_ACCEPT => Message::ServiceAccept {
                service: r.read_str()?,
            },
            tag::SHELL_COMMAND => Message::ShellCommand {
                command: r.read_str()?,
                cwd: r.read_str()?,
                request_id: read_uuid(&mut r)?,
            },
            tag::SHELL_RESULT => Message::ShellResult {
                stdout: r.read_str()?,
                stderr: r.read_str()?,
                exit_code: r.read_i32()?,
                cwd: r.read_str()?,
                request_id: read_uuid(&mut r)?,
            },
            tag::FILE_UPLOAD_REQUEST => Message::FileUploadRequest {
                filename: r.read_str()?,
                file_size: r.read_u64()?,
                target_path: r.read_str()?,
                request_id: read_uuid(&mut r)?,
            },
            tag::FILE_DOWNLOAD_REQUEST => Message::FileDownloadRequest {
                filename: r.read_str()?,
                request_id: read_uuid(&mut r)?,
            },
            tag::FILE_DATA => Message::FileData {
                filename: r.read_str()?,
                seq: r.read_u32()?,
                is_last: r.read_bool()?,
                file_size: r.read_option(|r| r.read_u64())?,
                data: r.read_bytes()?,
                request_id: read_uuid(&mut r)?,
            },
            tag::FILE_ACK => Message::FileAck {
                request_id: read_uuid(&mut r)?,
                status: FileAckStatus::from_tag(r.read_u8()?)?,
                message: r.read_option(|r| r.read_str())?,
            },
            tag::PORT_FORWARD_REQUEST => Message::PortForwardRequest {
                kind: PortForwardKind::from_tag(r.read_u8()?)?,
                source_port: r.read_u16()?,
                dest_host: r.read_str()?,
                dest_port: r.read_u16()?,
                connection_id: read_uuid(&mut r)?,
            },
            tag::PORT_FORWARD_ACCEPT => Message::PortForwardAccept {
                connection_id: read_uuid(&mut r)?,
                success: r.read_bool()?,
            },
            tag::PORT_FORWARD_DATA => Message::PortForwardData {
                connection_id: read_uuid(&mut r)?,
                data: r.read_bytes()?,
            },
            tag::PORT_FORWARD_CLOSE => Message::PortForwardClose {
                connection_id: read_uuid(&mut r)?,
            },
            tag::DISCONNECT => Message::Disconnect {
                reason: r.read_str()?,
            },
            tag::ERROR => Message::Error {
                request_id: r.read_option(|r| read_uuid(r))?,
                message: r.read_str()?,
            },
            tag::RELOAD_USERS => Message::ReloadUsers,
            other => {
                return Err(Error::ProtocolError(format!(
                    "unknown message type tag {other}"
                )))
            }
        };

        r.finish()?;
        Ok(message)
    }
}
