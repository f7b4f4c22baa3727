//! Pure predicates backing the cross-field refinements of the wizard schema.
//!
//! None of these functions touch wizard state; they are reused by the schema
//! builders, the CLI `validate` commands, and the demo fixtures.

use chrono::{Datelike, Local};

/// Minimum age enforced by the default wizard policy.
pub const ADULT_AGE: u32 = 18;

const NATIONAL_ID_DIGITS: usize = 11;
const NATIONAL_ID_SEPARATORS: [char; 3] = ['.', '-', '/'];

/// Validate a CPF, accepting either bare digits or the `000.000.000-00` layout.
pub fn validate_national_id(raw: &str) -> bool {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !NATIONAL_ID_SEPARATORS.contains(ch))
        .collect();

    if cleaned.len() != NATIONAL_ID_DIGITS || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u8> = cleaned.bytes().map(|b| b - b'0').collect();
    if digits.iter().all(|digit| *digit == digits[0]) {
        return false;
    }

    let mut base = [0u8; 9];
    base.copy_from_slice(&digits[..9]);
    let (first, second) = national_id_check_digits(&base);

    digits[9] == first && digits[10] == second
}

/// Compute both CPF check digits for the nine base digits.
pub fn national_id_check_digits(base: &[u8; 9]) -> (u8, u8) {
    let first = check_digit(base.iter().copied(), 10);
    let second = check_digit(base.iter().copied().chain(std::iter::once(first)), 11);
    (first, second)
}

fn check_digit(digits: impl Iterator<Item = u8>, first_weight: u32) -> u8 {
    let sum: u32 = digits
        .zip((2..=first_weight).rev())
        .map(|(digit, weight)| u32::from(digit) * weight)
        .sum();

    match 11 - (sum % 11) {
        10 | 11 => 0,
        remainder => remainder as u8,
    }
}

/// Year-only age rule evaluated against the local calendar year.
///
/// Only the four-character year prefix of the ISO date is inspected, so an
/// applicant turning 18 later this year already passes. This is the
/// `YEAR_ONLY_AGE_RULE` behavior; see [`validate_age_in`].
pub fn validate_age(birth_date_iso: &str) -> bool {
    validate_age_in(birth_date_iso, Local::now().year(), ADULT_AGE)
}

/// Year-only age rule with an explicit reference year and minimum age.
pub fn validate_age_in(birth_date_iso: &str, reference_year: i32, minimum_age: u32) -> bool {
    let Some(prefix) = birth_date_iso.trim().get(..4) else {
        return false;
    };
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    match prefix.parse::<i32>() {
        Ok(birth_year) => {
            i64::from(reference_year) - i64::from(birth_year) >= i64::from(minimum_age)
        }
        Err(_) => false,
    }
}

/// Require an uppercase letter, a digit, and a symbol. Length is the schema's concern.
pub fn validate_password_strength(password: &str) -> bool {
    let has_upper = password.chars().any(|ch| ch.is_ascii_uppercase());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
    let has_symbol = password.chars().any(|ch| !ch.is_ascii_alphanumeric());

    has_upper && has_digit && has_symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_check_digits(base: [u8; 9]) -> String {
        let (first, second) = national_id_check_digits(&base);
        base.iter()
            .chain([first, second].iter())
            .map(|digit| char::from(b'0' + digit))
            .collect()
    }

    #[test]
    fn national_id_accepts_known_valid_numbers() {
        assert!(validate_national_id("52998224725"));
        assert!(validate_national_id("529.982.247-25"));
        assert!(validate_national_id("111.444.777-35"));
    }

    #[test]
    fn national_id_rejects_wrong_check_digits() {
        assert!(!validate_national_id("52998224724"));
        assert!(!validate_national_id("111.444.777-53"));
    }

    #[test]
    fn national_id_rejects_repeated_digit_sequences() {
        for digit in 0..=9u8 {
            let repeated: String = std::iter::repeat(char::from(b'0' + digit))
                .take(11)
                .collect();
            assert!(!validate_national_id(&repeated), "{repeated} must be rejected");
        }
    }

    #[test]
    fn national_id_rejects_wrong_lengths_after_stripping() {
        assert!(!validate_national_id(""));
        assert!(!validate_national_id("5299822472"));
        assert!(!validate_national_id("529982247250"));
        assert!(!validate_national_id("529.982.247-2"));
        assert!(!validate_national_id("5299822472a"));
    }

    #[test]
    fn check_digits_round_trip_through_validator() {
        let bases = [
            [1, 2, 3, 4, 5, 6, 7, 8, 9],
            [9, 8, 7, 6, 5, 4, 3, 2, 1],
            [0, 0, 0, 0, 0, 0, 0, 0, 1],
            [5, 2, 9, 9, 8, 2, 2, 4, 7],
            [3, 1, 4, 1, 5, 9, 2, 6, 5],
        ];

        for base in bases {
            let cpf = with_check_digits(base);
            assert!(validate_national_id(&cpf), "{cpf} should validate");
        }
    }

    #[test]
    fn check_digits_match_reference_values() {
        assert_eq!(national_id_check_digits(&[1, 1, 1, 4, 4, 4, 7, 7, 7]), (3, 5));
        assert_eq!(national_id_check_digits(&[0, 0, 0, 0, 0, 0, 0, 0, 1]).0, 9);
        assert_eq!(national_id_check_digits(&[0, 0, 0, 0, 0, 0, 0, 0, 0]), (0, 0));
    }

    #[test]
    fn age_rule_accepts_the_2003_birth_date_after_2021() {
        for year in [2021, 2024, 2030] {
            assert!(validate_age_in("2003-04-20", year, ADULT_AGE));
        }
        assert!(validate_age("2003-04-20"));
    }

    #[test]
    fn age_rule_rejects_seventeen_year_olds() {
        let current = Local::now().year();
        let birth = format!("{:04}-01-01", current - 17);
        assert!(!validate_age(&birth));
    }

    #[test]
    fn year_only_age_rule_ignores_month_and_day() {
        assert!(validate_age_in("2006-12-31", 2024, ADULT_AGE));
        assert!(!validate_age_in("2007-01-01", 2024, ADULT_AGE));
    }

    #[test]
    fn age_rule_rejects_malformed_prefixes() {
        assert!(!validate_age_in("", 2024, ADULT_AGE));
        assert!(!validate_age_in("20", 2024, ADULT_AGE));
        assert!(!validate_age_in("abcd-01-01", 2024, ADULT_AGE));
        assert!(!validate_age_in("-200-01-01", 2024, ADULT_AGE));
    }

    #[test]
    fn password_strength_examples() {
        assert!(validate_password_strength("Abc#1"));
        assert!(!validate_password_strength("abc123"));
        assert!(!validate_password_strength("ABCDEF"));
        assert!(!validate_password_strength("Abcdef1"));
        assert!(!validate_password_strength("abc#1"));
        assert!(validate_password_strength("S3nha forte"));
    }
}
