//! The tree's compression function.
//!
//! Davies-Meyer over [`FieldCipher`]: a dual block is split into a key (first
//! 16 bytes) and a plaintext (last 16 bytes), and the digest is
//! `E(plaintext, key) + plaintext`. Feeding the plaintext forward makes the
//! map one-way even though the cipher is invertible.

use std::sync::LazyLock;

use binary_field::Gf2_128;

use crate::{
    Digest,
    cipher::FieldCipher,
    layout::{BLOCK_SIZE, DUAL_BLOCK_SIZE},
};

/// Domain string the cipher's affine layer is derived from.
pub const CIPHER_DOMAIN: &[u8] = b"merkle-commitment/field-cipher/gf2_128/v1";

static CIPHER: LazyLock<FieldCipher<Gf2_128>> =
    LazyLock::new(|| FieldCipher::derive(CIPHER_DOMAIN));

/// The process-wide cipher instance used by [`compress`].
pub fn cipher() -> &'static FieldCipher<Gf2_128> {
    &CIPHER
}

/// Split a dual block into its `(key, plaintext)` halves.
fn halves(block: &[u8; DUAL_BLOCK_SIZE]) -> (Gf2_128, Gf2_128) {
    let mut key = [0u8; BLOCK_SIZE];
    let mut plaintext = [0u8; BLOCK_SIZE];
    key.copy_from_slice(&block[..BLOCK_SIZE]);
    plaintext.copy_from_slice(&block[BLOCK_SIZE..]);
    (
        Gf2_128::from_le_bytes(key),
        Gf2_128::from_le_bytes(plaintext),
    )
}

/// Compress one dual block into a digest.
pub fn compress(block: &[u8; DUAL_BLOCK_SIZE]) -> Digest {
    let (key, plaintext) = halves(block);
    Digest::from_field(cipher().encrypt(plaintext, key) + plaintext)
}

/// Parent digest of two sibling digests.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut block = [0u8; DUAL_BLOCK_SIZE];
    block[..BLOCK_SIZE].copy_from_slice(left.as_bytes());
    block[BLOCK_SIZE..].copy_from_slice(right.as_bytes());
    compress(&block)
}
