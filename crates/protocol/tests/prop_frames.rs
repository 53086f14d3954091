use bytes::Bytes;
use proptest::prelude::*;
use xfer_protocol::{
    decode_frame, encode_frame, Abort, Accept, Ack, Cancel, Data, Done, Frame, FrameReader,
    Reason, Start, MAX_CHUNK_SIZE,
};

fn reason_strategy() -> impl Strategy<Value = Reason> {
    any::<u8>().prop_map(Reason::from_u8)
}

fn frame_strategy() -> impl Strategy<Value = Frame> {
    prop_oneof![
        (
            any::<u8>(),
            any::<u8>(),
            any::<u32>(),
            "[a-zA-Z0-9_./-]{0,128}",
            any::<u8>()
        )
            .prop_map(|(action, flags, size, type_name, send_id)| {
                Frame::Start(Start {
                    action,
                    flags,
                    size,
                    type_name,
                    send_id,
                })
            }),
        (any::<u8>(), any::<u8>())
            .prop_map(|(recv_id, send_id)| Frame::Accept(Accept { recv_id, send_id })),
        (
            any::<u8>(),
            any::<u8>(),
            any::<u16>(),
            prop::collection::vec(any::<u8>(), 0..=MAX_CHUNK_SIZE)
        )
            .prop_map(|(recv_id, token, seq, data)| {
                Frame::Data(Data {
                    recv_id,
                    token,
                    seq,
                    data: Bytes::from(data),
                })
            }),
        (any::<u8>(), any::<u8>(), any::<u16>())
            .prop_map(|(recv_id, token, seq)| Frame::Ack(Ack { recv_id, token, seq })),
        any::<u8>().prop_map(|recv_id| Frame::Done(Done { recv_id })),
        (any::<u8>(), reason_strategy())
            .prop_map(|(recv_id, reason)| Frame::Cancel(Cancel { recv_id, reason })),
        (any::<u8>(), reason_strategy())
            .prop_map(|(recv_id, reason)| Frame::Abort(Abort { recv_id, reason })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_frame_roundtrip(frame in frame_strategy()) {
        let mut buf = vec![0u8; frame.wire_size()];
        let written = encode_frame(&mut buf, &frame).unwrap();
        prop_assert_eq!(written, 1 + frame.encode_size());

        let (decoded, consumed) = decode_frame(&buf).unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn prop_truncated_frame_is_eof(
        frame in frame_strategy(),
        cut in any::<prop::sample::Index>()
    ) {
        let bytes = frame.to_bytes().unwrap();
        let len = cut.index(bytes.len());

        let err = decode_frame(&bytes[..len]).unwrap_err();
        prop_assert!(err.is_eof());
    }

    #[test]
    fn prop_reader_splits_stream(frames in prop::collection::vec(frame_strategy(), 0..8)) {
        let mut stream = Vec::new();
        for frame in &frames {
            stream.extend_from_slice(&frame.to_bytes().unwrap());
        }

        let decoded: Vec<Frame> = FrameReader::new(&stream)
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(decoded, frames);
    }
}
