//! Generates the opaque strings used as codes and tokens.
//!
//! Token strings in this crate are pure handles: they carry no encoded
//! state and are only meaningful to the store that minted them. The one
//! requirement on a generator is that its output be infeasible to guess.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

/// Produces opaque, unguessable strings.
///
/// When queried repeatedly, the output MUST be indistinguishable from a
/// random function. Any implementation that repeats strings within the
/// lifetime of the store breaks the single-use guarantee of codes.
pub trait TokenGenerator {
    /// Produce the next string.
    fn generate(&mut self) -> String;
}

/// Generates strings from random bytes.
///
/// Bytes are drawn from the operating system generator and encoded url-safe
/// so the result can travel in query strings and fragments unescaped. This
/// generator always succeeds.
pub struct RandomGenerator {
    len: usize,
}

impl RandomGenerator {
    /// Generates strings with a specific entropy in bytes.
    pub fn new(length: usize) -> RandomGenerator {
        RandomGenerator { len: length }
    }
}

impl TokenGenerator for RandomGenerator {
    fn generate(&mut self) -> String {
        let mut result = vec![0; self.len];
        OsRng.fill_bytes(result.as_mut_slice());
        URL_SAFE_NO_PAD.encode(&result)
    }
}

impl<'a, T: TokenGenerator + ?Sized + 'a> TokenGenerator for &'a mut T {
    fn generate(&mut self) -> String {
        (**self).generate()
    }
}

impl<T: TokenGenerator + ?Sized> TokenGenerator for Box<T> {
    fn generate(&mut self) -> String {
        (**self).generate()
    }
}
