//! `CryptDecrypter`, the two-key DES variant used by MaxtoCode encryption type 5.
//!
//! The cipher is DES with the standard tables, applied as decrypt/encrypt/decrypt with two
//! independently scheduled keys (an EDE construction with the subkey order flipped). It works
//! on bit arrays numbered least significant bit first within each byte, which is not the
//! numbering of FIPS 46, so the outputs differ from a stock DES implementation.
//!
//! # Examples
//!
//! ```rust
//! use dotunpack::cipher::CryptDecrypter;
//!
//! let key = b"0123456789ABCDE";
//! let encrypted = CryptDecrypter::encrypt(key, b"MaxtoCode\0\0\0\0\0\0\0")?;
//! assert_eq!(CryptDecrypter::decrypt(key, &encrypted)?, b"MaxtoCode\0\0\0\0\0\0\0");
//! # Ok::<(), dotunpack::Error>(())
//! ```

use crate::Result;

#[rustfmt::skip]
static SBOX: [u8; 512] = [
    14,  4, 13,  1,  2, 15, 11,  8,  3, 10,  6, 12,  5,  9,  0,  7,
     0, 15,  7,  4, 14,  2, 13,  1, 10,  6, 12, 11,  9,  5,  3,  8,
     4,  1, 14,  8, 13,  6,  2, 11, 15, 12,  9,  7,  3, 10,  5,  0,
    15, 12,  8,  2,  4,  9,  1,  7,  5, 11,  3, 14, 10,  0,  6, 13,
    15,  1,  8, 14,  6, 11,  3,  4,  9,  7,  2, 13, 12,  0,  5, 10,
     3, 13,  4,  7, 15,  2,  8, 14, 12,  0,  1, 10,  6,  9, 11,  5,
     0, 14,  7, 11, 10,  4, 13,  1,  5,  8, 12,  6,  9,  3,  2, 15,
    13,  8, 10,  1,  3, 15,  4,  2, 11,  6,  7, 12,  0,  5, 14,  9,
    10,  0,  9, 14,  6,  3, 15,  5,  1, 13, 12,  7, 11,  4,  2,  8,
    13,  7,  0,  9,  3,  4,  6, 10,  2,  8,  5, 14, 12, 11, 15,  1,
    13,  6,  4,  9,  8, 15,  3,  0, 11,  1,  2, 12,  5, 10, 14,  7,
     1, 10, 13,  0,  6,  9,  8,  7,  4, 15, 14,  3, 11,  5,  2, 12,
     7, 13, 14,  3,  0,  6,  9, 10,  1,  2,  8,  5, 11, 12,  4, 15,
    13,  8, 11,  5,  6, 15,  0,  3,  4,  7,  2, 12,  1, 10, 14,  9,
    10,  6,  9,  0, 12, 11,  7, 13, 15,  1,  3, 14,  5,  2,  8,  4,
     3, 15,  0,  6, 10,  1, 13,  8,  9,  4,  5, 11, 12,  7,  2, 14,
     2, 12,  4,  1,  7, 10, 11,  6,  8,  5,  3, 15, 13,  0, 14,  9,
    14, 11,  2, 12,  4,  7, 13,  1,  5,  0, 15, 10,  3,  9,  8,  6,
     4,  2,  1, 11, 10, 13,  7,  8, 15,  9, 12,  5,  6,  3,  0, 14,
    11,  8, 12,  7,  1, 14,  2, 13,  6, 15,  0,  9, 10,  4,  5,  3,
    12,  1, 10, 15,  9,  2,  6,  8,  0, 13,  3,  4, 14,  7,  5, 11,
    10, 15,  4,  2,  7, 12,  9,  5,  6,  1, 13, 14,  0, 11,  3,  8,
     9, 14, 15,  5,  2,  8, 12,  3,  7,  0,  4, 10,  1, 13, 11,  6,
     4,  3,  2, 12,  9,  5, 15, 10, 11, 14,  1,  7,  6,  0,  8, 13,
     4, 11,  2, 14, 15,  0,  8, 13,  3, 12,  9,  7,  5, 10,  6,  1,
    13,  0, 11,  7,  4,  9,  1, 10, 14,  3,  5, 12,  2, 15,  8,  6,
     1,  4, 11, 13, 12,  3,  7, 14, 10, 15,  6,  8,  0,  5,  9,  2,
     6, 11, 13,  8,  1,  4, 10,  7,  9,  5,  0, 15, 14,  2,  3, 12,
    13,  2,  8,  4,  6, 15, 11,  1, 10,  9,  3, 14,  5,  0, 12,  7,
     1, 15, 13,  8, 10,  3,  7,  4, 12,  5,  6, 11,  0, 14,  9,  2,
     7, 11,  4,  1,  9, 12, 14,  2,  0,  6, 10, 13, 15,  3,  5,  8,
     2,  1, 14,  7,  4, 10,  8, 13, 15, 12,  9,  0,  3,  5,  6, 11,
];

#[rustfmt::skip]
static PERM: [u8; 32] = [
    16,  7, 20, 21, 29, 12, 28, 17,  1, 15, 23, 26,  5, 18, 31, 10,
     2,  8, 24, 14, 32, 27,  3,  9, 19, 13, 30,  6, 22, 11,  4, 25,
];

#[rustfmt::skip]
static ESEL: [u8; 48] = [
    32,  1,  2,  3,  4,  5,  4,  5,  6,  7,  8,  9,  8,  9, 10, 11,
    12, 13, 12, 13, 14, 15, 16, 17, 16, 17, 18, 19, 20, 21, 20, 21,
    22, 23, 24, 25, 24, 25, 26, 27, 28, 29, 28, 29, 30, 31, 32,  1,
];

#[rustfmt::skip]
static IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10,  2, 60, 52, 44, 36, 28, 20, 12,  4,
    62, 54, 46, 38, 30, 22, 14,  6, 64, 56, 48, 40, 32, 24, 16,  8,
    57, 49, 41, 33, 25, 17,  9,  1, 59, 51, 43, 35, 27, 19, 11,  3,
    61, 53, 45, 37, 29, 21, 13,  5, 63, 55, 47, 39, 31, 23, 15,  7,
];

#[rustfmt::skip]
static FINAL: [u8; 64] = [
    40,  8, 48, 16, 56, 24, 64, 32, 39,  7, 47, 15, 55, 23, 63, 31,
    38,  6, 46, 14, 54, 22, 62, 30, 37,  5, 45, 13, 53, 21, 61, 29,
    36,  4, 44, 12, 52, 20, 60, 28, 35,  3, 43, 11, 51, 19, 59, 27,
    34,  2, 42, 10, 50, 18, 58, 26, 33,  1, 41,  9, 49, 17, 57, 25,
];

#[rustfmt::skip]
static PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17,  9,  1, 58, 50, 42, 34, 26, 18,
    10,  2, 59, 51, 43, 35, 27, 19, 11,  3, 60, 52, 44, 36,
    63, 55, 47, 39, 31, 23, 15,  7, 62, 54, 46, 38, 30, 22,
    14,  6, 61, 53, 45, 37, 29, 21, 13,  5, 28, 20, 12,  4,
];

#[rustfmt::skip]
static PC2: [u8; 48] = [
    14, 17, 11, 24,  1,  5,  3, 28, 15,  6, 21, 10,
    23, 19, 12,  4, 26,  8, 16,  7, 27, 20, 13,  2,
    41, 52, 31, 37, 47, 55, 30, 40, 51, 45, 33, 48,
    44, 49, 39, 56, 34, 53, 46, 42, 50, 36, 29, 32,
];

static ROTS: [usize; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

/// One bit per byte, values 0 or 1.
type Bits<const N: usize> = [u8; N];

/// Sixteen 48-bit round keys.
type KeySchedule = [Bits<48>; 16];

/// Direction in which the round keys are consumed by one DES pass.
#[derive(Clone, Copy)]
enum Order {
    /// Round keys 15 down to 0, the `L' = f(L) ^ R` form.
    Reverse,
    /// Round keys 0 up to 15, the `R' = f(R) ^ L` form.
    Forward,
}

fn to_bits<const N: usize>(bytes: &[u8]) -> Bits<N> {
    let mut bits = [0u8; N];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (bytes[i / 8] >> (i & 7)) & 1;
    }
    bits
}

fn from_bits(bits: &[u8], out: &mut [u8]) {
    out.fill(0);
    for (i, bit) in bits.iter().enumerate() {
        out[i / 8] |= bit << (i & 7);
    }
}

fn transpose<const N: usize>(bits: &[u8], table: &[u8; N]) -> Bits<N> {
    let mut result = [0u8; N];
    for (dst, &index) in result.iter_mut().zip(table) {
        *dst = bits[usize::from(index) - 1];
    }
    result
}

fn feistel(half: &[u8], round_key: &Bits<48>) -> Bits<32> {
    let mut expanded = transpose(half, &ESEL);
    for (bit, key_bit) in expanded.iter_mut().zip(round_key) {
        *bit ^= key_bit;
    }

    let mut substituted = [0u8; 32];
    for i in 0..8 {
        let d = &expanded[i * 6..i * 6 + 6];
        let index = (usize::from(d[0]) << 5)
            + (usize::from(d[5]) << 4)
            + (usize::from(d[1]) << 3)
            + (usize::from(d[2]) << 2)
            + (usize::from(d[3]) << 1)
            + usize::from(d[4])
            + i * 64;
        let value = SBOX[index];
        for j in 0..4 {
            substituted[i * 4 + j] = (value >> j) & 1;
        }
    }

    transpose(&substituted, &PERM)
}

fn schedule(key: &[u8]) -> KeySchedule {
    let mut block = [0u8; 8];
    let len = key.len().min(8);
    block[..len].copy_from_slice(&key[..len]);

    let permuted = transpose(&to_bits::<64>(&block), &PC1);
    let mut c: Bits<28> = [0; 28];
    let mut d: Bits<28> = [0; 28];
    c.copy_from_slice(&permuted[..28]);
    d.copy_from_slice(&permuted[28..]);

    let mut round_keys = [[0u8; 48]; 16];
    for (round_key, &rotation) in round_keys.iter_mut().zip(ROTS.iter()) {
        c.rotate_left(rotation);
        d.rotate_left(rotation);

        let mut joined = [0u8; 56];
        joined[..28].copy_from_slice(&c);
        joined[28..].copy_from_slice(&d);
        *round_key = transpose(&joined, &PC2);
    }
    round_keys
}

fn pass(block: &mut [u8], keys: &KeySchedule, order: Order) {
    let mut bits = transpose(&to_bits::<64>(block), &IP);

    for round in 0..16 {
        match order {
            Order::Reverse => {
                let old: Bits<32> = half_at(&bits, 0);
                let mut tmp = feistel(&old, &keys[15 - round]);
                xor_into(&mut tmp, &bits[32..]);
                bits[32..].copy_from_slice(&old);
                bits[..32].copy_from_slice(&tmp);
            }
            Order::Forward => {
                let old: Bits<32> = half_at(&bits, 32);
                let mut tmp = feistel(&old, &keys[round]);
                xor_into(&mut tmp, &bits[..32]);
                bits[..32].copy_from_slice(&old);
                bits[32..].copy_from_slice(&tmp);
            }
        }
    }

    from_bits(&transpose(&bits, &FINAL), block);
}

fn half_at(bits: &Bits<64>, start: usize) -> Bits<32> {
    let mut half = [0u8; 32];
    half.copy_from_slice(&bits[start..start + 32]);
    half
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Two-key DES variant used by MaxtoCode.
///
/// The key must be longer than 8 bytes: the first subkey is scheduled from `key[0..8]`, the
/// second from up to 8 bytes starting at `key[8]`, zero padded.
#[derive(Debug, Clone)]
pub struct CryptDecrypter {
    key1: KeySchedule,
    key2: KeySchedule,
}

impl CryptDecrypter {
    /// Schedule both subkeys.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid key size"`) if the key is 8 bytes
    /// or shorter.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() <= 8 {
            return Err(invalid_argument!("Invalid key size"));
        }

        Ok(CryptDecrypter {
            key1: schedule(key),
            key2: schedule(&key[8..]),
        })
    }

    /// Decrypt `data` with `key`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] for a key of 8 bytes or less, or a data length
    /// that is not a multiple of 8.
    pub fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Self::new(key)?.decrypt_blocks(data)
    }

    /// Encrypt `data` with `key`, the inverse of [`CryptDecrypter::decrypt`].
    ///
    /// # Errors
    /// Same conditions as [`CryptDecrypter::decrypt`].
    pub fn encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Self::new(key)?.encrypt_blocks(data)
    }

    /// Decrypt `data` with the scheduled keys.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid data length"`) if the length is
    /// not a multiple of 8.
    pub fn decrypt_blocks(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.apply(data, [Order::Reverse, Order::Forward, Order::Reverse])
    }

    /// Encrypt `data` with the scheduled keys.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid data length"`) if the length is
    /// not a multiple of 8.
    pub fn encrypt_blocks(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.apply(data, [Order::Forward, Order::Reverse, Order::Forward])
    }

    fn apply(&self, data: &[u8], orders: [Order; 3]) -> Result<Vec<u8>> {
        if data.len() % 8 != 0 {
            return Err(invalid_argument!("Invalid data length"));
        }

        let mut output = data.to_vec();
        for block in output.chunks_exact_mut(8) {
            pass(block, &self.key1, orders[0]);
            pass(block, &self.key2, orders[1]);
            pass(block, &self.key1, orders[2]);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn permutations_are_inverse() {
        let bits: Bits<64> = std::array::from_fn(|i| (i % 3 == 0) as u8);
        assert_eq!(transpose(&transpose(&bits, &IP), &FINAL), bits);
    }

    #[test]
    fn known_block() {
        let key: Vec<u8> = (1..=15).collect();
        let encrypted = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let plain = [0x26, 0xC0, 0x7E, 0xFA, 0xC2, 0x69, 0xF5, 0x8D];

        assert_eq!(CryptDecrypter::decrypt(&key, &encrypted).unwrap(), plain);
        assert_eq!(CryptDecrypter::encrypt(&key, &plain).unwrap(), encrypted);
    }

    #[test]
    fn round_trip() {
        let key: Vec<u8> = (1..=15).collect();
        let plain: Vec<u8> = (0..64).map(|i| (i * 7 + 3) as u8).collect();

        let encrypted = CryptDecrypter::encrypt(&key, &plain).unwrap();
        assert_ne!(encrypted, plain);
        assert_eq!(CryptDecrypter::decrypt(&key, &encrypted).unwrap(), plain);
    }

    #[test]
    fn blocks_are_independent() {
        let key = [0x5Au8; 12];
        let block = *b"\x01\x02\x03\x04\x05\x06\x07\x08";
        let mut doubled = block.to_vec();
        doubled.extend_from_slice(&block);

        let encrypted = CryptDecrypter::encrypt(&key, &doubled).unwrap();
        assert_eq!(encrypted[..8], encrypted[8..]);
    }

    #[test]
    fn short_second_key_is_zero_padded() {
        let short = [9u8, 8, 7, 6, 5, 4, 3, 2, 1];
        let padded = [9u8, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 0, 0, 0, 0, 0];
        let data = [0xA5u8; 16];
        assert_eq!(
            CryptDecrypter::decrypt(&short, &data).unwrap(),
            CryptDecrypter::decrypt(&padded, &data).unwrap()
        );
    }

    #[test]
    fn invalid_arguments() {
        match CryptDecrypter::decrypt(&[0u8; 8], &[0u8; 8]) {
            Err(Error::InvalidArgument(message)) => assert_eq!(message, "Invalid key size"),
            other => panic!("unexpected {other:?}"),
        }
        match CryptDecrypter::decrypt(&[0u8; 15], &[0u8; 12]) {
            Err(Error::InvalidArgument(message)) => assert_eq!(message, "Invalid data length"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(CryptDecrypter::decrypt(&[0u8; 15], &[]).unwrap().is_empty());
    }
}
