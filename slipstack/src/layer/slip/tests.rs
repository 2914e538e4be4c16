use super::*;
use crate::layer::ip::Link;
use crate::nic::external::External;

fn decode_all(decoder: &mut Decoder, bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for &byte in bytes {
        match decoder.process_byte(byte) {
            Status::Done => {
                frames.push(decoder.frame().to_vec());
                decoder.reset();
            },
            Status::Reset => decoder.reset(),
            Status::Ok | Status::Skip => (),
        }
    }
    frames
}

#[test]
fn encode_escapes() {
    let mut out = [0; 16];
    let len = encode(&[0x01, END, 0x02, ESC, 0x03], &mut out).unwrap();
    assert_eq!(&out[..len], &[END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, 0x03, END]);
    assert_eq!(encoded_len(&[0x01, END, 0x02, ESC, 0x03]), len);
}

#[test]
fn encode_too_small() {
    let mut out = [0; 4];
    assert_eq!(encode(&[END, END], &mut out), Err(Error::BadSize));
    assert_eq!(encode(&[0x45], &mut out), Ok(3));
}

#[test]
fn roundtrip() {
    let datagrams: [&[u8]; 4] = [
        &[0x45, 0x00, 0x00, 0x14],
        &[END],
        &[ESC, ESC_END, END, ESC_ESC, ESC],
        &[0x00; 100],
    ];

    let mut line = Vec::new();
    for datagram in datagrams.iter() {
        let mut out = vec![0; 2*datagram.len() + 2];
        let len = encode(datagram, &mut out).unwrap();
        line.extend_from_slice(&out[..len]);
    }

    let mut decoder = Decoder::new(MAX_MTU);
    let frames = decode_all(&mut decoder, &line);
    assert_eq!(frames.len(), datagrams.len());
    for (frame, datagram) in frames.iter().zip(datagrams.iter()) {
        assert_eq!(&frame[..], *datagram);
    }
}

#[test]
fn leading_delimiter_skipped() {
    let mut decoder = Decoder::new(MAX_MTU);
    assert_eq!(decoder.process_byte(END), Status::Skip);
    assert_eq!(decoder.process_byte(END), Status::Skip);
    assert_eq!(decoder.process_byte(0x45), Status::Ok);
    assert_eq!(decoder.process_byte(END), Status::Done);
    assert_eq!(decoder.frame(), &[0x45]);
}

#[test]
fn escape_state() {
    let mut decoder = Decoder::new(MAX_MTU);
    assert_eq!(decoder.process_byte(ESC), Status::Ok);
    assert!(decoder.frame().is_empty());
    assert_eq!(decoder.process_byte(ESC_END), Status::Ok);
    assert_eq!(decoder.process_byte(ESC), Status::Ok);
    assert_eq!(decoder.process_byte(ESC_ESC), Status::Ok);
    // An invalid escape keeps the byte.
    assert_eq!(decoder.process_byte(ESC), Status::Ok);
    assert_eq!(decoder.process_byte(0x17), Status::Ok);
    assert_eq!(decoder.process_byte(END), Status::Done);
    assert_eq!(decoder.frame(), &[END, ESC, 0x17]);
}

#[test]
fn overflow_resets() {
    let mut decoder = Decoder::new(4);
    for byte in 0..4 {
        assert_eq!(decoder.process_byte(byte), Status::Ok);
    }
    assert_eq!(decoder.process_byte(4), Status::Reset);
    decoder.reset();

    // The rest of the oversized frame ends up as a separate short frame.
    assert_eq!(decoder.process_byte(5), Status::Ok);
    assert_eq!(decoder.process_byte(END), Status::Done);
    decoder.reset();

    let frames = decode_all(&mut decoder, &[END, 1, 2, 3, END]);
    assert_eq!(frames, vec![vec![1u8, 2, 3]]);
}

#[test]
fn capacity_capped() {
    assert_eq!(Decoder::new(576).capacity(), 576);
    assert_eq!(Decoder::new(9000).capacity(), MAX_MTU);
}

#[test]
fn encoder_writes_device() {
    let mut device = External::new();
    let mut scratch = [0; MAX_ENCODED_LEN];
    let mut encoder = Encoder::new(&mut device, &mut scratch[..]);
    encoder.transmit(&[0x45, END, 0x00]).unwrap();
    assert_eq!(device.sent(), &[END, 0x45, ESC, ESC_END, 0x00, END]);
    assert_eq!(device.take_datagrams(), vec![vec![0x45, END, 0x00]]);
}

#[test]
fn encoder_scratch_too_small() {
    let mut device = External::new();
    let mut scratch = [0; 4];
    let mut encoder = Encoder::new(&mut device, &mut scratch[..]);
    assert_eq!(encoded_len(&[0x45, END]), 5);
    assert_eq!(encoder.transmit(&[0x45, END]), Err(Error::BadSize));
    assert!(device.sent().is_empty());
}
