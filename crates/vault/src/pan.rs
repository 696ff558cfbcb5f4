//! PAN and CVV generation.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::error::VaultError;

pub const MIN_BIN_LEN: usize = 6;
pub const MIN_PAN_LEN: usize = 13;
pub const MAX_PAN_LEN: usize = 19;
pub const DEFAULT_PAN_LEN: usize = 16;

/// Generates Luhn-valid card numbers and verification codes from an injected
/// randomness source.
///
/// The source sits behind a mutex so one generator can be shared across
/// concurrent issuance requests.
#[derive(Debug)]
pub struct PanGenerator<R = StdRng> {
    rng: Mutex<R>,
}

impl PanGenerator<StdRng> {
    /// Generator seeded from the operating system's CSPRNG.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for PanGenerator<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl<R: RngCore> PanGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// `bin` followed by random body digits and a trailing Luhn check digit,
    /// `length` digits in total.
    pub fn generate_pan(&self, bin: &str, length: usize) -> Result<String, VaultError> {
        if bin.len() < MIN_BIN_LEN || !bin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VaultError::invalid_argument(format!(
                "BIN must be at least {MIN_BIN_LEN} digits"
            )));
        }
        if !(MIN_PAN_LEN..=MAX_PAN_LEN).contains(&length) {
            return Err(VaultError::invalid_argument(format!(
                "PAN length must be between {MIN_PAN_LEN} and {MAX_PAN_LEN}, got {length}"
            )));
        }
        if bin.len() >= length {
            return Err(VaultError::invalid_argument(format!(
                "BIN of {} digits leaves no room in a {length}-digit PAN",
                bin.len()
            )));
        }

        let body_len = length - bin.len() - 1;
        let mut pan = String::with_capacity(length);
        pan.push_str(bin);
        {
            let mut rng = self.lock();
            for _ in 0..body_len {
                let digit: u8 = rng.gen_range(0..10);
                pan.push(char::from(b'0' + digit));
            }
        }
        pan.push(char::from(b'0' + luhn_check_digit(&pan)));
        Ok(pan)
    }

    /// Three-digit verification code, uniform over 100–999.
    pub fn generate_cvv(&self) -> String {
        let cvv: u16 = self.lock().gen_range(100..=999);
        cvv.to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, R> {
        // A panic mid-draw leaves the RNG state usable.
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Check digit to append to `partial` (digits only).
pub fn luhn_check_digit(partial: &str) -> u8 {
    let mut sum = 0u32;
    let mut double = true;
    for b in partial.bytes().rev() {
        let mut d = u32::from(b.saturating_sub(b'0'));
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    ((10 - sum % 10) % 10) as u8
}

pub fn is_luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (partial, check) = number.split_at(number.len() - 1);
    check.as_bytes()[0] - b'0' == luhn_check_digit(partial)
}
