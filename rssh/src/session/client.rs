//! Client-side handshake: key-exchange, host-key pinning, authentication.

use rsa::{RsaPrivateKey, RsaPublicKey};

use super::{ClientConfig, Session, Side, State};
use crate::codec::{Codec, Pipe};
use crate::crypto::{dh::KeyPair as DhKeyPair, kdf::Keys, rsa_keys};
use crate::error::{Error, Result};
use crate::protocol::{AuthType, Message};

/// How the client proves its identity to the server.
pub enum Credentials {
    Password(String),
    PublicKey {
        public_key: RsaPublicKey,
        private_key: RsaPrivateKey,
    },
    Dual {
        password: String,
        public_key: RsaPublicKey,
        private_key: RsaPrivateKey,
    },
}

/// Run the full client handshake over `stream`, returning a session with
/// `ServiceActive` state, ready to hand off to a dispatcher.
pub async fn connect<S: Pipe>(
    stream: S,
    config: &ClientConfig,
    username: &str,
    credentials: Credentials,
) -> Result<Session<S>> {
    tokio::time::timeout(
        config.handshake_timeout,
        connect_inner(stream, config, username, credentials),
    )
    .await
    .map_err(|_| Error::Timeout)?
}

async fn connect_inner<S: Pipe>(
    stream: S,
    config: &ClientConfig,
    username: &str,
    credentials: Credentials,
) -> Result<Session<S>> {
    let mut session = Session::new(Codec::new(stream), Side::Client, String::new());

    let dh = DhKeyPair::generate(&mut rand::thread_rng());
    session
        .send(&Message::KexInit {
            dh_pub: dh.public_bytes(),
            client_id: config.client_id.clone(),
        })
        .await?;
    session.transition(State::KexInProgress);

    let (server_dh_pub, server_rsa_pub, signature, session_id) = match session.receive().await? {
        Message::KexReply {
            dh_pub,
            server_rsa_pub,
            signature,
            session_id,
        } => (dh_pub, server_rsa_pub, signature, session_id),
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError(
                "expected KEX_REPLY after KEX_INIT".into(),
            ));
        }
    };

    let server_rsa_pub = rsa_keys::decode_public(&server_rsa_pub)?;
    let trust_store = super::trust::TrustStore::load(&config.trust_store_path)?;
    trust_store.verify(&server_rsa_pub)?;

    rsa_keys::verify(&server_dh_pub, &signature, &server_rsa_pub)
        .map_err(|_| Error::HostAuthFailure)?;

    let shared_secret = dh.compute_shared(&server_dh_pub);
    let keys = Keys::derive(&shared_secret);
    session.enable_encryption(keys);
    session.session_id = session_id.clone();
    session.transition(State::KexDone);

    session
        .send(&auth_request(username, &session_id, credentials)?)
        .await?;
    session.transition(State::AuthInProgress);

    match session.receive().await? {
        Message::AuthSuccess => session.transition(State::Authenticated),
        Message::AuthFailure { reason } => {
            session.transition(State::Closing);
            return Err(Error::AuthFailure(reason));
        }
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError(
                "expected AUTH_SUCCESS or AUTH_FAILURE".into(),
            ));
        }
    }

    session
        .send(&Message::ServiceRequest {
            service: "shell".into(),
        })
        .await?;

    match session.receive().await? {
        Message::ServiceAccept { .. } => session.transition(State::ServiceActive),
        _ => {
            session.transition(State::Closing);
            return Err(Error::ProtocolError(
                "expected SERVICE_ACCEPT after SERVICE_REQUEST".into(),
            ));
        }
    }

    Ok(session)
}

fn auth_request(username: &str, session_id: &str, credentials: Credentials) -> Result<Message> {
    let message = match credentials {
        Credentials::Password(password) => Message::AuthRequest {
            username: username.to_string(),
            auth_type: AuthType::Password,
            password: Some(password),
            public_key: None,
            signature: None,
        },
        Credentials::PublicKey {
            public_key,
            private_key,
        } => {
            let signature = rsa_keys::sign(session_id.as_bytes(), &private_key)?;

            Message::AuthRequest {
                username: username.to_string(),
                auth_type: AuthType::PublicKey,
                password: None,
                public_key: Some(rsa_keys::encode_public(&public_key)?),
                signature: Some(signature),
            }
        }
        Credentials::Dual {
            password,
            public_key,
            private_key,
        } => {
            let signature = rsa_keys::sign(session_id.as_bytes(), &private_key)?;

            Message::AuthRequest {
                username: username.to_string(),
                auth_type: AuthType::Dual,
                password: Some(password),
                public_key: Some(rsa_keys::encode_public(&public_key)?),
                signature: Some(signature),
            }
        }
    };

    Ok(message)
}
