//! The lazily-decrypted view over the VM's embedded resource.
//!
//! The ciphertext is partitioned into modulus-sized blocks; each block is an
//! independent RSA-like ciphertext (`plaintext = block^exponent mod modulus`).
//! A decrypted block carries `u8 payload_len || payload || padding`, so every
//! block except the final one contributes `block_size - 1` plaintext bytes.
//! That fixed per-block capacity is what makes random access O(1): a
//! plaintext position maps straight to a block index, and only the final
//! block needs decrypting up front to know the total plaintext length.
//!
//! Blocks decrypt on first touch and land in a cache shared by every cursor
//! forked from the same stream. Decryption is deterministic and idempotent,
//! so two workers racing on the same block at worst duplicate work.

use std::sync::Arc;

use dashmap::DashMap;
use num_bigint::BigUint;

use crate::{
    crypto::key::VmKey,
    file::io::{read_le_at, CilIO},
    Error, Result,
};

/// Reference point for [`CipherStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset from the start of the plaintext.
    Begin,
    /// Offset from the current position.
    Current,
    /// Offset from the end of the plaintext.
    End,
}

/// Shared decryption state: ciphertext, key and the block cache.
#[derive(Debug)]
struct CipherCore {
    ciphertext: Vec<u8>,
    modulus: BigUint,
    exponent: BigUint,
    block_size: usize,
    block_count: usize,
    length: u64,
    cache: DashMap<usize, Arc<Vec<u8>>>,
}

impl CipherCore {
    /// Decrypted payload of one block, from the cache when available.
    fn payload(&self, block_index: usize) -> Result<Arc<Vec<u8>>> {
        if let Some(hit) = self.cache.get(&block_index) {
            return Ok(Arc::clone(&hit));
        }

        let payload = Arc::new(self.decrypt_block(block_index)?);
        self.cache.insert(block_index, Arc::clone(&payload));
        Ok(payload)
    }

    fn decrypt_block(&self, block_index: usize) -> Result<Vec<u8>> {
        let start = block_index * self.block_size;
        let block = &self.ciphertext[start..start + self.block_size];

        let ciphertext = BigUint::from_bytes_be(block);
        let plaintext = ciphertext.modpow(&self.exponent, &self.modulus);
        let raw = plaintext.to_bytes_be();
        if raw.len() > self.block_size {
            return Err(malformed_error!(
                "Block {block_index} decrypts wider than its block size"
            ));
        }

        // Big-endian layout: the integer is right-aligned in the block.
        let mut plain = vec![0u8; self.block_size - raw.len()];
        plain.extend_from_slice(&raw);

        let declared = usize::from(plain[0]);
        if declared >= self.block_size {
            return Err(Error::DecryptionOverflow {
                block: block_index,
                declared,
            });
        }
        if block_index + 1 < self.block_count && declared != self.block_size - 1 {
            return Err(malformed_error!(
                "Interior block {block_index} declares {declared} payload bytes, expected {}",
                self.block_size - 1
            ));
        }

        Ok(plain[1..=declared].to_vec())
    }
}

/// A seekable plaintext cursor over the encrypted resource.
///
/// Cursors are cheap to [`fork`](CipherStream::fork): the ciphertext, key and
/// decrypted-block cache are shared, only the position is per-cursor. The
/// pipeline runs one cursor pair per worker (instruction stream plus token
/// resolver stream) so reads never interfere.
#[derive(Debug)]
pub struct CipherStream {
    core: Arc<CipherCore>,
    position: u64,
}

impl CipherStream {
    /// Build a stream over `ciphertext` with the given key.
    ///
    /// Only the final block is decrypted here (to fix the plaintext length);
    /// everything else decrypts on first read.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] when the ciphertext is not a whole number
    /// of blocks or the modulus is too small to carry a length byte, and
    /// [`Error::DecryptionOverflow`] when the final block declares an
    /// impossible payload length.
    pub fn new(ciphertext: Vec<u8>, key: &VmKey) -> Result<CipherStream> {
        let block_size = key.block_size();
        if block_size < 2 {
            return Err(malformed_error!(
                "Modulus of {block_size} bytes cannot carry a block layout"
            ));
        }
        if ciphertext.len() % block_size != 0 {
            return Err(malformed_error!(
                "Ciphertext of {} bytes is not a whole number of {block_size}-byte blocks",
                ciphertext.len()
            ));
        }

        let block_count = ciphertext.len() / block_size;
        let core = CipherCore {
            ciphertext,
            modulus: key.modulus.clone(),
            exponent: key.exponent.clone(),
            block_size,
            block_count,
            length: 0,
            cache: DashMap::new(),
        };

        let length = if block_count == 0 {
            0
        } else {
            let last = core.payload(block_count - 1)?.len();
            ((block_count - 1) * (block_size - 1) + last) as u64
        };

        let mut core = core;
        core.length = length;

        Ok(CipherStream {
            core: Arc::new(core),
            position: 0,
        })
    }

    /// An independent cursor over the same plaintext and block cache.
    #[must_use]
    pub fn fork(&self) -> CipherStream {
        CipherStream {
            core: Arc::clone(&self.core),
            position: 0,
        }
    }

    /// Total plaintext length in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.core.length
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor. Out-of-range positions are clamped to
    /// `[0, length]`; clamping is not an error.
    ///
    /// Returns the new position.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let base = match origin {
            SeekOrigin::Begin => 0i128,
            SeekOrigin::Current => i128::from(self.position),
            SeekOrigin::End => i128::from(self.core.length),
        };

        let target = base + i128::from(offset);
        let clamped = target.clamp(0, i128::from(self.core.length));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.position = clamped as u64;
        }
        self.position
    }

    /// Read up to `dst.len()` bytes, returning how many were read. Returns 0
    /// at end of stream.
    ///
    /// # Errors
    /// Propagates block-decryption failures.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let capacity = (self.core.block_size - 1) as u64;
        let mut written = 0usize;

        while written < dst.len() && self.position < self.core.length {
            #[allow(clippy::cast_possible_truncation)]
            let block_index = (self.position / capacity) as usize;
            #[allow(clippy::cast_possible_truncation)]
            let block_offset = (self.position % capacity) as usize;

            let payload = self.core.payload(block_index)?;
            let available = payload.len().saturating_sub(block_offset);
            let count = available.min(dst.len() - written);
            if count == 0 {
                break;
            }

            dst[written..written + count]
                .copy_from_slice(&payload[block_offset..block_offset + count]);
            written += count;
            self.position += count as u64;
        }

        Ok(written)
    }

    /// Read exactly `dst.len()` bytes.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the stream ends first.
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let read = self.read(dst)?;
        if read != dst.len() {
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }

    /// Read a primitive in little-endian, advancing past it.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the stream ends first.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        let mut buffer = [0u8; 8];
        let width = std::mem::size_of::<T>();
        self.read_exact(&mut buffer[..width])?;
        let mut offset = 0;
        read_le_at(&buffer[..width], &mut offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    /// Key with exponent 1 over a 9-byte all-ones modulus: "decryption" is
    /// the identity as long as every block value stays below the modulus,
    /// which lets tests author plaintext block layouts directly.
    fn identity_key() -> VmKey {
        VmKey {
            modulus: BigUint::from_bytes_be(&[0xFF; 9]),
            exponent: BigUint::one(),
            session_key: Vec::new(),
        }
    }

    /// Two full blocks and one short block, plaintext = 1..=20.
    fn sample_stream() -> CipherStream {
        let mut data = Vec::new();
        data.push(8);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data.push(8);
        data.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        data.push(4);
        data.extend_from_slice(&[17, 18, 19, 20, 0, 0, 0, 0]);
        CipherStream::new(data, &identity_key()).unwrap()
    }

    #[test]
    fn test_length() {
        assert_eq!(sample_stream().length(), 20);
        let empty = CipherStream::new(Vec::new(), &identity_key()).unwrap();
        assert_eq!(empty.length(), 0);
    }

    #[test]
    fn test_sequential_read_across_blocks() {
        let mut stream = sample_stream();
        let mut buffer = [0u8; 20];
        assert_eq!(stream.read(&mut buffer).unwrap(), 20);
        let expected: Vec<u8> = (1..=20).collect();
        assert_eq!(&buffer[..], &expected[..]);

        // At end of stream reads return 0.
        assert_eq!(stream.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_seek_and_random_access() {
        let mut stream = sample_stream();
        assert_eq!(stream.seek(10, SeekOrigin::Begin), 10);
        assert_eq!(stream.read_le::<u8>().unwrap(), 11);

        assert_eq!(stream.seek(-1, SeekOrigin::End), 19);
        assert_eq!(stream.read_le::<u8>().unwrap(), 20);

        stream.seek(5, SeekOrigin::Begin);
        assert_eq!(stream.seek(2, SeekOrigin::Current), 7);
        assert_eq!(stream.read_le::<u8>().unwrap(), 8);
    }

    #[test]
    fn test_seek_clamps_without_error() {
        let mut stream = sample_stream();
        assert_eq!(stream.seek(-5, SeekOrigin::Begin), 0);
        assert_eq!(stream.seek(1000, SeekOrigin::Begin), 20);
        assert_eq!(stream.seek(i64::MIN, SeekOrigin::Current), 0);
    }

    #[test]
    fn test_reads_are_deterministic_across_forks() {
        let stream = sample_stream();
        let mut first = stream.fork();
        let mut second = stream.fork();

        first.seek(3, SeekOrigin::Begin);
        second.seek(3, SeekOrigin::Begin);

        let mut a = [0u8; 9];
        let mut b = [0u8; 9];
        first.read_exact(&mut a).unwrap();
        second.read_exact(&mut b).unwrap();
        assert_eq!(a, b);

        // Cursor independence: moving one does not move the other.
        assert_eq!(first.position(), second.position());
        first.seek(0, SeekOrigin::Begin);
        assert_eq!(second.position(), 12);
    }

    #[test]
    fn test_payload_overflow_is_reported() {
        // Single block declaring 9 payload bytes in a 9-byte block.
        let mut data = vec![9u8];
        data.extend_from_slice(&[0; 8]);
        let err = CipherStream::new(data, &identity_key()).unwrap_err();
        assert!(matches!(
            err,
            Error::DecryptionOverflow {
                block: 0,
                declared: 9
            }
        ));
    }

    #[test]
    fn test_short_interior_block_is_malformed() {
        let mut data = Vec::new();
        data.push(4); // interior block must carry 8
        data.extend_from_slice(&[1, 2, 3, 4, 0, 0, 0, 0]);
        data.push(2);
        data.extend_from_slice(&[9, 10, 0, 0, 0, 0, 0, 0]);
        let mut stream = CipherStream::new(data, &identity_key()).unwrap();
        let mut buffer = [0u8; 4];
        assert!(matches!(
            stream.read(&mut buffer),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_partial_block_ciphertext_is_malformed() {
        assert!(CipherStream::new(vec![0; 10], &identity_key()).is_err());
    }

    #[test]
    fn test_read_le_spans_blocks() {
        let mut stream = sample_stream();
        stream.seek(6, SeekOrigin::Begin);
        // Bytes 7, 8 | 9, 10 across the block boundary.
        assert_eq!(stream.read_le::<u32>().unwrap(), u32::from_le_bytes([7, 8, 9, 10]));
    }

    #[test]
    fn test_true_modular_exponentiation_roundtrip() {
        // Tiny RSA key: p = 233, q = 251, n = 58483, e = 65537.
        // d = e^-1 mod phi(n); encrypting with d makes the stream's public
        // exponentiation recover the plaintext.
        let n = 58483u64;
        let phi = 232u64 * 250;
        let d = modinv(65537, phi);

        let key = VmKey {
            modulus: BigUint::from(n),
            exponent: BigUint::from(65537u32),
            session_key: Vec::new(),
        };
        assert_eq!(key.block_size(), 2);

        // Plaintext blocks are [1, byte]; capacity is 1 byte per block.
        let plaintext = [0xDEu8, 0xAD, 0x42];
        let mut ciphertext = Vec::new();
        for (index, byte) in plaintext.iter().enumerate() {
            let m = BigUint::from(0x0100u32 + u32::from(*byte));
            let c = m.modpow(&BigUint::from(d), &BigUint::from(n));
            let raw = c.to_bytes_be();
            assert!(raw.len() <= 2, "block {index} too wide");
            if raw.len() < 2 {
                ciphertext.push(0);
            }
            ciphertext.extend_from_slice(&raw);
        }

        let mut stream = CipherStream::new(ciphertext, &key).unwrap();
        assert_eq!(stream.length(), 3);
        let mut recovered = [0u8; 3];
        stream.read_exact(&mut recovered).unwrap();
        assert_eq!(recovered, plaintext);
    }

    /// Modular inverse by extended Euclid; test-only helper.
    fn modinv(a: u64, modulus: u64) -> u64 {
        let (mut old_r, mut r) = (i128::from(a), i128::from(modulus));
        let (mut old_s, mut s) = (1i128, 0i128);
        while r != 0 {
            let q = old_r / r;
            (old_r, r) = (r, old_r - q * r);
            (old_s, s) = (s, old_s - q * s);
        }
        assert_eq!(old_r, 1, "inputs are not coprime");
        let inv = old_s.rem_euclid(i128::from(modulus));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            inv as u64
        }
    }
}
