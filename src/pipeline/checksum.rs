//! Check-digit validation for Brazilian taxpayer identifiers.
//!
//! * **CPF**: 11-digit national individual ID.
//! * **CNPJ**: 14-digit national entity ID.
//!
//! Both use the same modulus-11 rule per check digit: take a weighted sum of
//! the preceding digits, `r = sum % 11`, expected digit is `0` when `r < 2`
//! and `11 - r` otherwise. Identifiers made of a single repeated digit pass
//! the arithmetic but are never issued, so they are rejected up front.
//! Punctuation (`123.456.789-09`, `11.222.333/0001-81`) is ignored.

const CPF_FIRST_WEIGHTS: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_SECOND_WEIGHTS: [u32; 10] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Validate a CPF (national individual ID).
pub fn validate_cpf(text: &str) -> bool {
    let digits = digits_of(text);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }
    check_digit(&digits[..9], &CPF_FIRST_WEIGHTS) == digits[9]
        && check_digit(&digits[..10], &CPF_SECOND_WEIGHTS) == digits[10]
}

/// Validate a CNPJ (national entity ID).
pub fn validate_cnpj(text: &str) -> bool {
    let digits = digits_of(text);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }
    check_digit(&digits[..12], &CNPJ_FIRST_WEIGHTS) == digits[12]
        && check_digit(&digits[..13], &CNPJ_SECOND_WEIGHTS) == digits[13]
}

fn digits_of(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}
