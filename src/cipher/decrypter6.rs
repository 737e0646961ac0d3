//! `Decrypter6`, the Feistel-like block cipher behind MaxtoCode encryption type 6.
//!
//! The key is eight little-endian words. Each 8-byte block is treated as two words and run
//! through the 32 sub-round function 100 times. The round function substitutes every byte of
//! `x + k` through one of four 256-entry tables, built by pairing two 16-entry nibble tables,
//! and rotates the result right by 21 bits.

use crate::{file::io::read_le, Result};

static D1H: [u8; 16] = [14, 4, 13, 21, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7];
static D1L: [u8; 16] = [15, 1, 8, 14, 6, 11, 3, 4, 30, 7, 2, 13, 12, 0, 5, 10];
static D2H: [u8; 16] = [10, 0, 9, 14, 6, 3, 15, 5, 23, 13, 12, 7, 11, 4, 2, 8];
static D2L: [u8; 16] = [7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15];
static D3H: [u8; 16] = [2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9];
static D3L: [u8; 16] = [12, 1, 10, 15, 9, 2, 6, 8, 2, 13, 3, 4, 14, 7, 5, 11];
static D4H: [u8; 16] = [4, 11, 12, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1];
static D4L: [u8; 16] = [13, 2, 8, 14, 6, 7, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7];

const ITERATIONS: usize = 100;

/// Which half a sub-round updates.
#[derive(Clone, Copy)]
enum Half {
    X,
    Y,
}

/// The 32 sub-rounds of one round: (updated half, key word). The updated half is XORed with
/// `F(other + key[k])`.
static SUB_ROUNDS: [(Half, usize); 32] = {
    use Half::{X, Y};
    [
        (Y, 0), (X, 1), (Y, 2), (X, 3), (Y, 4), (X, 5), (Y, 6), (X, 7),
        (Y, 7), (X, 6), (Y, 5), (X, 4), (Y, 3), (X, 2), (Y, 1), (X, 0),
        (Y, 7), (X, 6), (Y, 5), (X, 4), (Y, 3), (X, 2), (Y, 1), (X, 0),
        (Y, 7), (X, 6), (Y, 5), (X, 4), (Y, 3), (X, 2), (Y, 1), (X, 0),
    ]
};

fn generate(high: &[u8; 16], low: &[u8; 16]) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        // Some nibble table entries exceed 15, the overflow is truncated to a byte.
        *entry = ((u32::from(high[i >> 4]) << 4) | u32::from(low[i & 0x0F])) as u8;
    }
    table
}

/// MaxtoCode's type 6 block cipher.
#[derive(Debug, Clone)]
pub struct Decrypter6 {
    key: [u32; 8],
    gen1: [u8; 256],
    gen2: [u8; 256],
    gen3: [u8; 256],
    gen4: [u8; 256],
}

impl Decrypter6 {
    /// Create a cipher instance from a 32 byte key.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid key size"`) unless the key is
    /// exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(invalid_argument!("Invalid key size"));
        }

        let mut words = [0u32; 8];
        for (word, chunk) in words.iter_mut().zip(key.chunks_exact(4)) {
            *word = read_le::<u32>(chunk)?;
        }

        Ok(Decrypter6 {
            key: words,
            gen1: generate(&D1H, &D1L),
            gen2: generate(&D2H, &D2L),
            gen3: generate(&D3H, &D3L),
            gen4: generate(&D4H, &D4L),
        })
    }

    /// Decrypt `data` with a 32 byte `key`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] for a wrong key size or a data length that is
    /// not a multiple of 8.
    pub fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Self::new(key)?.decrypt_blocks(data)
    }

    /// Encrypt `data` with a 32 byte `key`, the inverse of [`Decrypter6::decrypt`].
    ///
    /// # Errors
    /// Same conditions as [`Decrypter6::decrypt`].
    pub fn encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Self::new(key)?.encrypt_blocks(data)
    }

    /// Decrypt `data` block by block.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid data length"`) if the length is
    /// not a multiple of 8.
    pub fn decrypt_blocks(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.apply(data, |x, y| self.round(x, y))
    }

    /// Encrypt `data` block by block.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] (`"Invalid data length"`) if the length is
    /// not a multiple of 8.
    pub fn encrypt_blocks(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.apply(data, |x, y| self.inverse_round(x, y))
    }

    fn apply(&self, data: &[u8], step: impl Fn(u32, u32) -> (u32, u32)) -> Result<Vec<u8>> {
        if data.len() % 8 != 0 {
            return Err(invalid_argument!("Invalid data length"));
        }

        let mut output = Vec::with_capacity(data.len());
        for block in data.chunks_exact(8) {
            let mut x = read_le::<u32>(&block[..4])?;
            let mut y = read_le::<u32>(&block[4..])?;
            for _ in 0..ITERATIONS {
                (x, y) = step(x, y);
            }
            output.extend_from_slice(&x.to_le_bytes());
            output.extend_from_slice(&y.to_le_bytes());
        }
        Ok(output)
    }

    fn substitute(&self, value: u32) -> u32 {
        let [b0, b1, b2, b3] = value.to_le_bytes();
        let x = (u32::from(self.gen1[usize::from(b3)]) << 24)
            | (u32::from(self.gen2[usize::from(b2)]) << 16)
            | (u32::from(self.gen3[usize::from(b1)]) << 8)
            | u32::from(self.gen4[usize::from(b0)]);
        x.rotate_right(21)
    }

    fn sub_round(&self, x: &mut u32, y: &mut u32, half: Half, k: usize) {
        match half {
            Half::X => *x ^= self.substitute(y.wrapping_add(self.key[k])),
            Half::Y => *y ^= self.substitute(x.wrapping_add(self.key[k])),
        }
    }

    /// One full round, `(i0, i1) -> (o0, o1)` with the halves swapped on output.
    fn round(&self, i0: u32, i1: u32) -> (u32, u32) {
        let (mut x, mut y) = (i0, i1);
        for &(half, k) in &SUB_ROUNDS {
            self.sub_round(&mut x, &mut y, half, k);
        }
        (y, x)
    }

    fn inverse_round(&self, o0: u32, o1: u32) -> (u32, u32) {
        let (mut x, mut y) = (o1, o0);
        for &(half, k) in SUB_ROUNDS.iter().rev() {
            self.sub_round(&mut x, &mut y, half, k);
        }
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn key() -> Vec<u8> {
        (0..32u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect()
    }

    #[test]
    fn generated_tables_truncate() {
        let table = generate(&D1H, &D1L);
        // high nibble 21 << 4 overflows, low nibble 30 sets bit 4
        assert_eq!(table[0x30], ((21u32 << 4) | 15) as u8);
        assert_eq!(table[0x08], ((14u32 << 4) | 30) as u8);
    }

    #[test]
    fn known_block() {
        let encrypted = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let plain = [0xE3, 0x7D, 0x5B, 0x4B, 0x89, 0x5C, 0x3E, 0x64];

        assert_eq!(Decrypter6::decrypt(&key(), &encrypted).unwrap(), plain);
        assert_eq!(Decrypter6::encrypt(&key(), &plain).unwrap(), encrypted);
    }

    #[test]
    fn round_trip() {
        let plain: Vec<u8> = (0..48).map(|i| (255 - i) as u8).collect();
        let encrypted = Decrypter6::encrypt(&key(), &plain).unwrap();
        assert_ne!(encrypted, plain);
        assert_eq!(Decrypter6::decrypt(&key(), &encrypted).unwrap(), plain);
    }

    #[test]
    fn single_round_inverse() {
        let cipher = Decrypter6::new(&key()).unwrap();
        let (o0, o1) = cipher.round(0xDEAD_BEEF, 0x0BAD_F00D);
        assert_eq!(cipher.inverse_round(o0, o1), (0xDEAD_BEEF, 0x0BAD_F00D));
    }

    #[test]
    fn invalid_arguments() {
        match Decrypter6::decrypt(&[0u8; 31], &[0u8; 8]) {
            Err(Error::InvalidArgument(message)) => assert_eq!(message, "Invalid key size"),
            other => panic!("unexpected {other:?}"),
        }
        match Decrypter6::decrypt(&[0u8; 32], &[0u8; 9]) {
            Err(Error::InvalidArgument(message)) => assert_eq!(message, "Invalid data length"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
