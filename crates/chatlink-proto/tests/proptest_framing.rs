//! Property tests for framing: arbitrary text in payload values never breaks
//! the one-frame-per-line invariant.

use bytes::BytesMut;
use chatlink_proto::frame::{Frame, FrameCodec};
use chatlink_proto::{MessageSubject, PlayerStatusMessage, StatusValue, STATUS_CHANNEL};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

proptest! {
    #[test]
    fn any_text_survives_framing(name in ".{0,16}", reason in ".{0,200}", custom in ".{0,200}") {
        let subject = MessageSubject::new(Uuid::new_v4(), name, "survival");
        let msg = PlayerStatusMessage::status_update(
            &subject,
            "nickname_color",
            StatusValue::Str(custom),
            &reason,
        );

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Frame::envelope(STATUS_CHANNEL, &msg).unwrap(), &mut buf).unwrap();

        prop_assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        prop_assert!(buf.is_empty());
        prop_assert_eq!(frame.to_envelope().unwrap(), msg);
    }

    #[test]
    fn decoder_never_panics(junk in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&junk[..]);
        let _ = codec.decode(&mut buf);
    }
}
