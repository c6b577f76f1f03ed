//! Keyed permutation over a binary extension field.
//!
//! Every round inverts the state (with `0 -> 0`), applies the affine layer
//! `A(x) = L(x) + Ac`, where `L` is the linearized polynomial
//! `a0*x + a1*x^2 + a2*x^4 + a3*x^8`, then adds a round constant and a round
//! key. Round constants alternate `0, 1, 0, 1, ...` to break the symmetry
//! between rounds. Round keys come from the master key through the same
//! inversion and affine layer.
//!
//! `A^-1` is tabulated once at construction, so decryption costs the same as
//! encryption.

use binary_field::{BinaryField, LinearMap};

/// Number of rounds.
pub const ROUNDS: usize = 10;

/// One key per round plus the whitening key.
pub type RoundKeys<F> = [F; ROUNDS + 1];

/// Evaluate `a0*x + a1*x^2 + a2*x^4 + a3*x^8`.
fn linearized<F: BinaryField>(coefficients: &[F; 4], x: F) -> F {
    let mut power = x;
    let mut acc = F::ZERO;
    for (i, coefficient) in coefficients.iter().enumerate() {
        if i > 0 {
            power = power.square();
        }
        acc += *coefficient * power;
    }
    acc
}

/// The block cipher, with its affine layer and inverse precomputed.
#[derive(Debug, Clone)]
pub struct FieldCipher<F: BinaryField> {
    affine: LinearMap<F>,
    affine_inverse: LinearMap<F>,
    affine_constant: F,
    round_constants: RoundKeys<F>,
}

impl<F: BinaryField> FieldCipher<F> {
    /// Build a cipher from the coefficients of `L` and the constant `Ac`.
    ///
    /// Returns `None` if `L` is not a bijection.
    pub fn new(linear_coefficients: [F; 4], affine_constant: F) -> Option<Self> {
        let affine = LinearMap::from_fn(|x| linearized(&linear_coefficients, x));
        let affine_inverse = affine.inverse()?;
        Some(Self {
            affine,
            affine_inverse,
            affine_constant,
            round_constants: core::array::from_fn(|i| if i % 2 == 1 { F::ONE } else { F::ZERO }),
        })
    }

    /// Derive the affine layer deterministically from `domain`.
    ///
    /// Candidates for `a0..a3` and `Ac` are read from the BLAKE3 output
    /// stream of `domain || attempt`; the first attempt with an invertible
    /// `L` is used.
    pub fn derive(domain: &[u8]) -> Self {
        let mut attempt = 0u64;
        loop {
            let [a0, a1, a2, a3, constant] = derive_elements::<F>(domain, attempt);
            if let Some(cipher) = Self::new([a0, a1, a2, a3], constant) {
                return cipher;
            }
            attempt += 1;
        }
    }

    /// The constant `Ac` of the affine layer.
    pub fn affine_constant(&self) -> F {
        self.affine_constant
    }

    /// Round constants `rc[0..=ROUNDS]`.
    pub fn round_constants(&self) -> &RoundKeys<F> {
        &self.round_constants
    }

    fn affine(&self, x: F) -> F {
        self.affine.apply(x) + self.affine_constant
    }

    fn affine_inverse(&self, y: F) -> F {
        self.affine_inverse.apply(y + self.affine_constant)
    }

    /// Expand a master key: `k[0] = K`, `k[r] = A(k[r-1]^-1) + rc[r]`.
    pub fn key_schedule(&self, master_key: F) -> RoundKeys<F> {
        let mut keys = [F::ZERO; ROUNDS + 1];
        keys[0] = master_key;
        for r in 1..=ROUNDS {
            keys[r] = self.affine(keys[r - 1].inverse()) + self.round_constants[r];
        }
        keys
    }

    /// Encrypt under already expanded round keys.
    pub fn encrypt_with_keys(&self, plaintext: F, keys: &RoundKeys<F>) -> F {
        let mut state = plaintext + keys[0];
        for (key, constant) in keys[1..].iter().zip(&self.round_constants[1..]) {
            state = self.affine(state.inverse()) + *constant + *key;
        }
        state
    }

    /// Decrypt under already expanded round keys.
    pub fn decrypt_with_keys(&self, ciphertext: F, keys: &RoundKeys<F>) -> F {
        let mut state = ciphertext;
        for (key, constant) in keys[1..]
            .iter()
            .zip(&self.round_constants[1..])
            .rev()
        {
            state = self.affine_inverse(state + *constant + *key).inverse();
        }
        state + keys[0]
    }

    /// Encrypt one element under `key`.
    pub fn encrypt(&self, plaintext: F, key: F) -> F {
        self.encrypt_with_keys(plaintext, &self.key_schedule(key))
    }

    /// Decrypt one element under `key`.
    pub fn decrypt(&self, ciphertext: F, key: F) -> F {
        self.decrypt_with_keys(ciphertext, &self.key_schedule(key))
    }
}

fn derive_elements<F: BinaryField>(domain: &[u8], attempt: u64) -> [F; 5] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&attempt.to_le_bytes());
    let mut reader = hasher.finalize_xof();
    core::array::from_fn(|_| {
        let mut bytes = vec![0u8; F::BYTES];
        reader.fill(&mut bytes);
        F::from_uniform_bytes(&bytes)
    })
}
