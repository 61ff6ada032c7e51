use std::io::{self, Read, Write};

use aes::cipher::{generic_array::GenericArray, KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr128BE;
use rand::RngCore;

use crate::kdf::Key;

type Aes256Ctr = Ctr128BE<Aes256>;

/// IV length for the streaming adapter, also the length prepended to the ciphertext stream.
pub const IV_LEN: usize = 16;

/// Wraps a plaintext reader, emitting a random IV first and then the XOR-transformed plaintext.
///
/// Used to client-side-encrypt file bodies before they leave the process; ciphertext length is
/// always `plaintext length + IV_LEN`. This is AES-CTR: it provides confidentiality but no
/// integrity, matching the design notes' acceptance of an already-authenticated transport.
pub struct EncryptReader<R> {
	iv_remaining: Vec<u8>,
	stream: Aes256Ctr,
	inner: R,
}

impl<R: Read> EncryptReader<R> {
	/// Creates an encrypting reader around `inner`, drawing a fresh random IV.
	pub fn new(key: &Key, inner: R) -> Self {
		let mut iv = [0u8; IV_LEN];
		rand::thread_rng().fill_bytes(&mut iv);
		let stream = Aes256Ctr::new(GenericArray::from_slice(key.bytes()), GenericArray::from_slice(&iv));
		EncryptReader { iv_remaining: iv.to_vec(), stream, inner }
	}
}

impl<R: Read> Read for EncryptReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if !self.iv_remaining.is_empty() {
			let n = buf.len().min(self.iv_remaining.len());
			buf[..n].copy_from_slice(&self.iv_remaining[..n]);
			self.iv_remaining.drain(..n);
			return Ok(n);
		}

		let n = self.inner.read(buf)?;
		if n > 0 {
			self.stream.apply_keystream(&mut buf[..n]);
		}
		Ok(n)
	}
}

/// Wraps a plaintext sink, consuming the first [`IV_LEN`] bytes written to it as the stream IV
/// before XOR-transforming everything after onto the underlying writer.
///
/// The exact inverse of [`EncryptReader`]: piping an `EncryptReader`'s output into a
/// `DecryptWriter` reproduces the original plaintext byte-for-byte.
pub struct DecryptWriter<W> {
	key: Key,
	stream: Option<Aes256Ctr>,
	pending_iv: Vec<u8>,
	inner: W,
}

impl<W: Write> DecryptWriter<W> {
	/// Creates a decrypting writer around `inner`.
	pub fn new(key: &Key, inner: W) -> Self {
		DecryptWriter { key: key.clone(), stream: None, pending_iv: Vec::with_capacity(IV_LEN), inner }
	}
}

impl<W: Write> Write for DecryptWriter<W> {
	fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
		let total = buf.len();

		if self.stream.is_none() {
			let need = IV_LEN - self.pending_iv.len();
			let take = need.min(buf.len());
			self.pending_iv.extend_from_slice(&buf[..take]);
			buf = &buf[take..];

			if self.pending_iv.len() < IV_LEN {
				return Ok(total);
			}

			let iv: [u8; IV_LEN] = self.pending_iv[..IV_LEN].try_into().unwrap();
			self.stream = Some(Aes256Ctr::new(
				GenericArray::from_slice(self.key.bytes()),
				GenericArray::from_slice(&iv),
			));
		}

		if buf.is_empty() {
			return Ok(total);
		}

		let mut plain = buf.to_vec();
		self.stream.as_mut().unwrap().apply_keystream(&mut plain);
		self.inner.write_all(&plain)?;
		Ok(total)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn round_trips_exact_bytes() {
		let key = Key::derive("stream-key");
		let plaintext: Vec<u8> = (0..10 * 1024).map(|i| (i % 251) as u8).collect();

		let mut encrypted = Vec::new();
		let mut reader = EncryptReader::new(&key, Cursor::new(&plaintext));
		io::copy(&mut reader, &mut encrypted).unwrap();
		assert_eq!(encrypted.len(), plaintext.len() + IV_LEN);

		let mut decrypted = Vec::new();
		{
			let mut writer = DecryptWriter::new(&key, &mut decrypted);
			writer.write_all(&encrypted).unwrap();
		}
		assert_eq!(decrypted, plaintext);
	}

	#[test]
	fn small_chunked_writes_still_round_trip() {
		let key = Key::derive("chunked");
		let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();

		let mut encrypted = Vec::new();
		let mut reader = EncryptReader::new(&key, Cursor::new(&plaintext));
		io::copy(&mut reader, &mut encrypted).unwrap();

		let mut decrypted = Vec::new();
		{
			let mut writer = DecryptWriter::new(&key, &mut decrypted);
			for byte_chunk in encrypted.chunks(3) {
				writer.write_all(byte_chunk).unwrap();
			}
		}
		assert_eq!(decrypted, plaintext);
	}
}
