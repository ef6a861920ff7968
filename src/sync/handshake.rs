//! Link handshake.
//!
//! A backend opens the connection and sends exactly one hello frame on the
//! link channel naming itself. The proxy accepts nothing else until that
//! hello arrives, then records the link under the announced name.

use chatlink_proto::frame::Frame;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Inbound connection, waiting for the hello.
    AwaitingHello,
    /// Hello accepted.
    Established { server: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("expected hello, got frame on {0}")]
    ExpectedHello(String),
    #[error("malformed hello: {0}")]
    Malformed(String),
    #[error("hello with empty server name")]
    EmptyName,
    #[error("server {0} is not an allowed backend")]
    NotAllowed(String),
    #[error("handshake already complete")]
    AlreadyEstablished,
}

/// Proxy side of the handshake.
pub struct HandshakeMachine {
    pub state: HandshakeState,
    allowed: Option<Vec<String>>,
}

impl HandshakeMachine {
    /// `allowed` restricts which backend names may link; `None` accepts any.
    pub fn inbound(allowed: Option<Vec<String>>) -> Self {
        Self {
            state: HandshakeState::AwaitingHello,
            allowed,
        }
    }

    /// Feed the first frame of a connection. Returns the backend name.
    pub fn step(&mut self, frame: &Frame) -> Result<String, HandshakeError> {
        if let HandshakeState::Established { .. } = self.state {
            return Err(HandshakeError::AlreadyEstablished);
        }
        if !frame.is_on(chatlink_proto::LINK_CHANNEL) {
            return Err(HandshakeError::ExpectedHello(frame.channel.clone()));
        }
        let hello = frame
            .to_hello()
            .map_err(|e| HandshakeError::Malformed(e.to_string()))?;
        let server = hello.server_name.trim().to_owned();
        if server.is_empty() {
            return Err(HandshakeError::EmptyName);
        }
        if let Some(allowed) = &self.allowed
            && !allowed.iter().any(|a| *a == server)
        {
            return Err(HandshakeError::NotAllowed(server));
        }
        self.state = HandshakeState::Established {
            server: server.clone(),
        };
        Ok(server)
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, HandshakeState::Established { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_proto::STATUS_CHANNEL;

    #[test]
    fn hello_establishes() {
        let mut hs = HandshakeMachine::inbound(None);
        let name = hs.step(&Frame::hello("survival").unwrap()).unwrap();
        assert_eq!(name, "survival");
        assert!(hs.is_established());
        assert_eq!(
            hs.step(&Frame::hello("survival").unwrap()),
            Err(HandshakeError::AlreadyEstablished)
        );
    }

    #[test]
    fn status_frame_before_hello_is_rejected() {
        let mut hs = HandshakeMachine::inbound(None);
        let frame = Frame {
            channel: STATUS_CHANNEL.to_owned(),
            payload: "{}".to_owned(),
        };
        assert_eq!(
            hs.step(&frame),
            Err(HandshakeError::ExpectedHello(STATUS_CHANNEL.to_owned()))
        );
        assert_eq!(hs.state, HandshakeState::AwaitingHello);
    }

    #[test]
    fn allow_list_is_enforced() {
        let mut hs = HandshakeMachine::inbound(Some(vec!["lobby".into()]));
        assert_eq!(
            hs.step(&Frame::hello("rogue").unwrap()),
            Err(HandshakeError::NotAllowed("rogue".into()))
        );
        assert_eq!(hs.step(&Frame::hello("lobby").unwrap()), Ok("lobby".into()));
    }

    #[test]
    fn malformed_and_empty_hello() {
        let mut hs = HandshakeMachine::inbound(None);
        let bad = Frame {
            channel: chatlink_proto::LINK_CHANNEL.to_owned(),
            payload: "not json".to_owned(),
        };
        assert!(matches!(hs.step(&bad), Err(HandshakeError::Malformed(_))));
        assert_eq!(hs.step(&Frame::hello("  ").unwrap()), Err(HandshakeError::EmptyName));
    }
}
