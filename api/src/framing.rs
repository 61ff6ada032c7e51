//! Length-prefixed message framing for the client/server-streaming calls (`Upload`,
//! `Download`).
//!
//! Unary calls carry a single [`prost::Message`] as the entire request/response body, decoded
//! with a plain `T::decode(bytes)` call. Streaming calls instead carry a
//! sequence of messages, so each one is prefixed with a 4-byte big-endian length; this module
//! holds the pure encode/decode logic, with no I/O of its own. The actual byte-stream
//! plumbing (reading chunks off a hyper body, writing them to one) lives in the server and
//! client crates.

use bytes::{Buf, Bytes, BytesMut};
use prost::Message;

const LEN_PREFIX_SIZE: usize = 4;

/// Encodes `msg` as `be_u32(len) || msg` for appending to a streaming request/response body.
pub fn encode_frame<T: Message>(msg: &T) -> Vec<u8> {
	let body = msg.encode_to_vec();
	let mut out = Vec::with_capacity(LEN_PREFIX_SIZE + body.len());
	out.extend_from_slice(&(body.len() as u32).to_be_bytes());
	out.extend_from_slice(&body);
	out
}

/// Accumulates raw bytes off a stream and yields complete length-prefixed frames as they
/// become available.
///
/// Callers push whatever-sized chunks arrive from the underlying transport via
/// [`FrameDecoder::push`] and repeatedly call [`FrameDecoder::next_frame`] until it returns
/// `None`, at which point more bytes are needed.
#[derive(Default)]
pub struct FrameDecoder {
	buf: BytesMut,
}

impl FrameDecoder {
	/// Creates an empty decoder.
	pub fn new() -> Self {
		Self { buf: BytesMut::new() }
	}

	/// Appends newly received bytes to the internal buffer.
	pub fn push(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	/// Pops one complete frame's raw bytes off the buffer, if one is fully buffered.
	pub fn next_frame(&mut self) -> Option<Bytes> {
		if self.buf.len() < LEN_PREFIX_SIZE {
			return None;
		}
		let len = u32::from_be_bytes(self.buf[..LEN_PREFIX_SIZE].try_into().unwrap()) as usize;
		if self.buf.len() < LEN_PREFIX_SIZE + len {
			return None;
		}
		self.buf.advance(LEN_PREFIX_SIZE);
		Some(self.buf.split_to(len).freeze())
	}

	/// Whether any unconsumed bytes remain, used to detect a stream that ended mid-frame.
	pub fn has_pending_bytes(&self) -> bool {
		!self.buf.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Clone, PartialEq, ::prost::Message)]
	struct Sample {
		#[prost(string, tag = "1")]
		value: ::prost::alloc::string::String,
	}

	#[test]
	fn round_trips_a_single_frame() {
		let msg = Sample { value: "hello".to_string() };
		let encoded = encode_frame(&msg);

		let mut decoder = FrameDecoder::new();
		decoder.push(&encoded);
		let frame = decoder.next_frame().unwrap();
		let decoded = Sample::decode(frame).unwrap();
		assert_eq!(decoded, msg);
		assert!(decoder.next_frame().is_none());
	}

	#[test]
	fn handles_frames_arriving_split_across_pushes() {
		let msg = Sample { value: "a longer value to split across chunks".to_string() };
		let encoded = encode_frame(&msg);

		let mut decoder = FrameDecoder::new();
		for (i, byte) in encoded.iter().enumerate() {
			if i < encoded.len() - 1 {
				assert!(decoder.next_frame().is_none());
			}
			decoder.push(std::slice::from_ref(byte));
		}
		let frame = decoder.next_frame().unwrap();
		assert_eq!(Sample::decode(frame).unwrap(), msg);
	}

	#[test]
	fn decodes_multiple_frames_pushed_together() {
		let a = Sample { value: "a".to_string() };
		let b = Sample { value: "b".to_string() };
		let mut bytes = encode_frame(&a);
		bytes.extend(encode_frame(&b));

		let mut decoder = FrameDecoder::new();
		decoder.push(&bytes);
		let decoded_a = Sample::decode(decoder.next_frame().unwrap()).unwrap();
		let decoded_b = Sample::decode(decoder.next_frame().unwrap()).unwrap();
		assert_eq!(decoded_a, a);
		assert_eq!(decoded_b, b);
	}
}
