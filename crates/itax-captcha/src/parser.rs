use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// The captcha font reliably smears the last character or two into garbage
/// (a stray `=`, `?` or fragment of the box border). Never more than two.
const MAX_TRAILING_NOISE: usize = 2;

/// Parse an OCR'd arithmetic expression and compute the answer.
///
/// Supported operators are `+` and `-` only; that matches the portal's
/// captcha scheme, and anything else fails loudly rather than mis-parsing.
/// When both signs appear in the OCR output, `+` wins — a minus is the
/// commoner recognition artifact.
pub fn solve_expression(raw: &str) -> Result<i64> {
    let cleaned = strip_trailing_noise(raw.trim());
    if cleaned.is_empty() {
        return Err(Error::EmptyText);
    }

    let numbers: Vec<i64> = DIGIT_RUN
        .find_iter(cleaned)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if numbers.len() < 2 {
        return Err(Error::TooFewNumbers(numbers.len()));
    }

    if cleaned.contains('+') {
        Ok(numbers[0] + numbers[1])
    } else if cleaned.contains('-') {
        Ok(numbers[0] - numbers[1])
    } else {
        Err(Error::UnsupportedOperator(cleaned.to_string()))
    }
}

/// Drop up to [`MAX_TRAILING_NOISE`] trailing characters that cannot end a
/// valid expression (anything that is not a digit).
fn strip_trailing_noise(text: &str) -> &str {
    let mut cleaned = text;
    for _ in 0..MAX_TRAILING_NOISE {
        match cleaned.chars().last() {
            Some(c) if !c.is_ascii_digit() => {
                cleaned = cleaned[..cleaned.len() - c.len_utf8()].trim_end();
            }
            _ => break,
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition() {
        assert_eq!(solve_expression("7 + 5").unwrap(), 12);
    }

    #[test]
    fn test_subtraction() {
        assert_eq!(solve_expression("9 - 4").unwrap(), 5);
    }

    #[test]
    fn test_multi_digit_operands() {
        assert_eq!(solve_expression("12 + 34").unwrap(), 46);
        assert_eq!(solve_expression("100 - 1").unwrap(), 99);
    }

    #[test]
    fn test_trailing_noise_stripped() {
        // The `= ?` tail is the classic artifact of this captcha font.
        assert_eq!(solve_expression("7 + 5 =?").unwrap(), 12);
        assert_eq!(solve_expression("3 + 4 x").unwrap(), 7);
    }

    #[test]
    fn test_trailing_noise_bounded() {
        // Three junk characters leave one behind; digits still parse.
        assert_eq!(solve_expression("8 + 2 =??").unwrap(), 10);
    }

    #[test]
    fn test_single_number_fails() {
        assert!(matches!(
            solve_expression("42"),
            Err(Error::TooFewNumbers(1))
        ));
    }

    #[test]
    fn test_no_numbers_fails() {
        assert!(matches!(
            solve_expression("hello +"),
            Err(Error::TooFewNumbers(0))
        ));
    }

    #[test]
    fn test_unsupported_operator_fails() {
        assert!(matches!(
            solve_expression("6 * 7"),
            Err(Error::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_empty_text_fails() {
        assert!(matches!(solve_expression("   "), Err(Error::EmptyText)));
        assert!(matches!(solve_expression("=?"), Err(Error::EmptyText)));
    }

    #[test]
    fn test_plus_wins_over_minus() {
        // OCR sometimes reads box borders as '-'; prefer the explicit '+'.
        assert_eq!(solve_expression("-7 + 5").unwrap(), 12);
    }

    #[test]
    fn test_negative_result_allowed() {
        assert_eq!(solve_expression("4 - 9").unwrap(), -5);
    }
}
