//! Server-side handshake: key-exchange, host-key proof, authentication policy.

use rand::RngCore;

use super::trust::UserDirectory;
use super::{ServerConfig, Session, Side, State};
use crate::codec::{Codec, Pipe};
use crate::crypto::{dh::KeyPair as DhKeyPair, kdf::Keys, rsa_keys};
use crate::error::{Error, Result};
use crate::protocol::{AuthType, Message};

/// Run the full server handshake over `stream`, returning a session with
/// `ServiceActive` state, ready to hand off to a dispatcher.
///
/// `users` is consulted only for `AUTH_REQUEST`; the shell/transfer/forward
/// services themselves are driven by the caller after this returns.
pub async fn accept<S: Pipe>(
    stream: S,
    config: &ServerConfig,
    users: &dyn UserDirectory,
) -> Result<Session<S>> {
    tokio::time::timeout(config.handshake_timeout, accept_inner(stream, config, users))
        .await
        .map_err(|_| Error::Timeout)?
}

async fn accept_inner<S: Pipe>(
    stream: S,
    config: &ServerConfig,
    users: &dyn UserDirectory,
) -> Result<Session<S>> {
    let mut session_id_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut session_id_bytes);
    let session_id = hex_encode(&session_id_bytes);

    let mut session = Session::new(Codec::new(stream), Side::Server, session_id.clone());

    let client_dh_pub = match session.receive().await? {
        Message::KexInit { dh_pub, .. } => dh_pub,
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError("expected KEX_INIT".into()));
        }
    };
    session.transition(State::KexInProgress);

    let host_private_key = rsa_keys::load_private(&config.host_private_key_path)?;
    let host_public_key = rsa_keys::load_public(&config.host_public_key_path)?;

    let dh = DhKeyPair::generate(&mut rand::thread_rng());
    let signature = rsa_keys::sign(&dh.public_bytes(), &host_private_key)?;

    session
        .send(&Message::KexReply {
            dh_pub: dh.public_bytes(),
            server_rsa_pub: rsa_keys::encode_public(&host_public_key)?,
            signature,
            session_id: session_id.clone(),
        })
        .await?;

    let shared_secret = dh.compute_shared(&client_dh_pub);
    let keys = Keys::derive(&shared_secret);
    session.enable_encryption(keys);
    session.transition(State::KexDone);

    match session.receive().await? {
        Message::AuthRequest {
            username,
            auth_type,
            password,
            public_key,
            signature,
        } => {
            session.transition(State::AuthInProgress);

            match authenticate(users, &username, auth_type, password, public_key, signature, &session_id) {
                Ok(()) => {
                    session.send(&Message::AuthSuccess).await?;
                    session.transition(State::Authenticated);
                }
                Err(reason) => {
                    session
                        .send(&Message::AuthFailure {
                            reason: reason.clone(),
                        })
                        .await?;
                    session.transition(State::Closing);
                    return Err(Error::AuthFailure(reason));
                }
            }
        }
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError("expected AUTH_REQUEST".into()));
        }
    }

    match session.receive().await? {
        Message::ServiceRequest { service } => {
            session.send(&Message::ServiceAccept { service }).await?;
            session.transition(State::ServiceActive);
        }
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError("expected SERVICE_REQUEST".into()));
        }
    }

    Ok(session)
}

/// The server's authentication policy (§4.4): `password` compares hashes;
/// `publickey` requires directory membership and a valid signature over the
/// session id; `dual` requires both.
fn authenticate(
    users: &dyn UserDirectory,
    username: &str,
    auth_type: AuthType,
    password: Option<String>,
    public_key: Option<String>,
    signature: Option<Vec<u8>>,
    session_id: &str,
) -> std::result::Result<(), String> {
    let record = users
        .lookup(username)
        .ok_or_else(|| "no such user".to_string())?;

    let check_password = |password: &Option<String>| -> std::result::Result<(), String> {
        let password = password.as_deref().ok_or("missing password")?;
        if super::trust::hash_password(password) == record.password_hash {
            Ok(())
        } else {
            Err("password mismatch".into())
        }
    };

    let check_public_key = |public_key: &Option<String>,
                             signature: &Option<Vec<u8>>|
     -> std::result::Result<(), String> {
        let public_key_encoded = public_key.as_deref().ok_or("missing public key")?;
        let signature = signature.as_deref().ok_or("missing signature")?;

        if !record
            .authorized_keys
            .iter()
            .any(|key| key == public_key_encoded)
        {
            return Err("public key not authorized".into());
        }

        let public_key = rsa_keys::decode_public(public_key_encoded).map_err(|e| e.to_string())?;
        rsa_keys::verify(session_id.as_bytes(), signature, &public_key)
            .map_err(|_| "signature verification failed".to_string())
    };

    match auth_type {
        AuthType::Password => check_password(&password),
        AuthType::PublicKey => check_public_key(&public_key, &signature),
        AuthType::Dual => {
            check_password(&password)?;
            check_public_key(&public_key, &signature)
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
