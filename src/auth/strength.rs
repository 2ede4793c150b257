//! Rule- and heuristic-based password quality scoring.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::PasswordPolicyConfig;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>?";

/// Horizontal rows plus vertical/diagonal columns of a standard layout.
/// A password containing any 3-character window of one of these sequences
/// (forward or reverse) is considered patterned.
const KEYBOARD_SEQUENCES: &[&str] = &[
    "qwertyuiop",
    "asdfghjkl",
    "zxcvbnm",
    "1234567890",
    "1qaz",
    "2wsx",
    "3edc",
    "4rfv",
    "5tgb",
    "6yhn",
    "7ujm",
    "8ik",
    "9ol",
    "0p",
];

/// Worst offenders from public breach corpora. Config can extend this list.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty",
    "qwerty123",
    "abc123",
    "letmein",
    "welcome",
    "welcome1",
    "admin",
    "admin123",
    "iloveyou",
    "monkey",
    "dragon",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "master",
    "shadow",
    "superman",
    "batman",
    "trustno1",
    "freedom",
    "whatever",
    "starwars",
    "login",
    "access",
    "secret",
    "gamer",
    "gaming",
];

#[derive(Debug, Clone, Serialize)]
pub struct StrengthReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLabel {
    VeryWeak,
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl std::fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryWeak => write!(f, "very weak"),
            Self::Weak => write!(f, "weak"),
            Self::Medium => write!(f, "medium"),
            Self::Strong => write!(f, "strong"),
            Self::VeryStrong => write!(f, "very strong"),
        }
    }
}

pub struct PasswordStrengthValidator {
    min_length: usize,
    max_length: usize,
    common: HashSet<String>,
}

impl PasswordStrengthValidator {
    #[must_use]
    pub fn new(config: &PasswordPolicyConfig) -> Self {
        let mut common: HashSet<String> =
            COMMON_PASSWORDS.iter().map(|p| (*p).to_string()).collect();
        common.extend(config.extra_common_passwords.iter().map(|p| p.to_lowercase()));

        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            common,
        }
    }

    /// Checks every rule and reports all violations at once so the caller can
    /// present actionable feedback instead of one error per round trip.
    #[must_use]
    pub fn validate(&self, password: &str) -> StrengthReport {
        let mut errors = Vec::new();
        let len = password.chars().count();

        if len < self.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                self.min_length
            ));
        }
        if len > self.max_length {
            errors.push(format!(
                "Password must be at most {} characters long",
                self.max_length
            ));
        }
        if !password.chars().any(char::is_uppercase) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if !password.chars().any(char::is_lowercase) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit".to_string());
        }
        if !password.chars().any(|c| SYMBOLS.contains(c)) {
            errors.push("Password must contain at least one symbol".to_string());
        }
        if self.is_common(password) {
            errors.push("Password is too common".to_string());
        }
        if has_simple_pattern(password) {
            errors.push(
                "Password contains a predictable sequence or repeated characters".to_string(),
            );
        }

        StrengthReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Scores 0..=100. The score is advisory; validity is decided by
    /// [`Self::validate`].
    #[must_use]
    pub fn score(&self, password: &str) -> u8 {
        let len = password.chars().count();
        let mut score: i32 = (len as i32 * 2).min(30);

        if password.chars().any(char::is_uppercase) {
            score += 10;
        }
        if password.chars().any(char::is_lowercase) {
            score += 10;
        }
        if password.chars().any(|c| c.is_ascii_digit()) {
            score += 10;
        }
        if password.chars().any(|c| SYMBOLS.contains(c)) {
            score += 10;
        }

        if self.is_common(password) {
            score -= 30;
        }
        if has_simple_pattern(password) {
            score -= 20;
        }

        let mut counts = std::collections::HashMap::new();
        for c in password.chars() {
            *counts.entry(c).or_insert(0u32) += 1;
        }
        let duplicates: u32 = counts.values().map(|&n| n.saturating_sub(1)).sum();
        score -= (duplicates as i32 * 2).min(10);

        score.clamp(0, 100) as u8
    }

    #[must_use]
    pub fn classify(&self, password: &str) -> StrengthLabel {
        match self.score(password) {
            0..=29 => StrengthLabel::VeryWeak,
            30..=49 => StrengthLabel::Weak,
            50..=74 => StrengthLabel::Medium,
            75..=89 => StrengthLabel::Strong,
            _ => StrengthLabel::VeryStrong,
        }
    }

    /// Produces a random password that passes [`Self::validate`] by
    /// construction: one character from each required class, random fill,
    /// then a shuffle. The shuffle can accidentally line up a sequence, so
    /// the result is re-rolled a bounded number of times before falling
    /// back to strict class interleaving.
    #[must_use]
    pub fn generate(&self, len: usize) -> String {
        const MAX_SHUFFLE_ATTEMPTS: usize = 32;

        let len = len.clamp(self.min_length, self.max_length);
        let mut rng = rand::rng();

        for _ in 0..MAX_SHUFFLE_ATTEMPTS {
            let mut chars: Vec<char> = vec![
                pick(&mut rng, UPPER),
                pick(&mut rng, LOWER),
                pick(&mut rng, DIGITS),
                pick(&mut rng, SYMBOLS),
            ];

            let all: Vec<char> = [UPPER, LOWER, DIGITS, SYMBOLS].concat().chars().collect();
            while chars.len() < len {
                chars.push(all[rng.random_range(0..all.len())]);
            }
            chars.shuffle(&mut rng);

            let candidate: String = chars.into_iter().collect();
            if self.validate(&candidate).is_valid {
                return candidate;
            }
        }

        interleave_classes(&mut rng, len)
    }

    fn is_common(&self, password: &str) -> bool {
        self.common.contains(&password.to_lowercase())
    }
}

fn pick(rng: &mut impl Rng, set: &str) -> char {
    let chars: Vec<char> = set.chars().collect();
    chars[rng.random_range(0..chars.len())]
}

/// Cycles through the character classes in a fixed order. Adjacent
/// characters always come from different classes, so a triple repeat,
/// a codepoint run, or a keyboard-row window can never form.
fn interleave_classes(rng: &mut impl Rng, len: usize) -> String {
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];
    (0..len)
        .map(|i| pick(rng, classes[i % classes.len()]))
        .collect()
}

/// Detects 3-character keyboard runs, triple repeats, and straight
/// ascending/descending codepoint runs.
#[must_use]
pub fn has_simple_pattern(password: &str) -> bool {
    let lowered: Vec<char> = password.to_lowercase().chars().collect();

    for window in lowered.windows(3) {
        let chunk: String = window.iter().collect();

        if window[0] == window[1] && window[1] == window[2] {
            return true;
        }

        let forward: String = chunk.clone();
        let reverse: String = chunk.chars().rev().collect();
        if KEYBOARD_SEQUENCES
            .iter()
            .any(|seq| seq.contains(&forward) || seq.contains(&reverse))
        {
            return true;
        }

        let a = window[0] as i64;
        let b = window[1] as i64;
        let c = window[2] as i64;
        if (b - a == 1 && c - b == 1) || (a - b == 1 && b - c == 1) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PasswordStrengthValidator {
        PasswordStrengthValidator::new(&PasswordPolicyConfig::default())
    }

    #[test]
    fn strong_password_passes() {
        let report = validator().validate("correct-Horse1!");
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn short_password_lists_all_violations() {
        let report = validator().validate("abc");
        assert!(!report.is_valid);
        // length, uppercase, digit, symbol, and the "abc" ascending run
        assert!(report.errors.len() >= 4);
    }

    #[test]
    fn missing_classes_are_reported() {
        let report = validator().validate("lowercaseonly!x");
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("uppercase")));
        assert!(report.errors.iter().any(|e| e.contains("digit")));
    }

    #[test]
    fn common_password_rejected_case_insensitively() {
        let report = validator().validate("Password123");
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("common")));
    }

    #[test]
    fn keyboard_runs_detected() {
        assert!(has_simple_pattern("xxqwex"));
        assert!(has_simple_pattern("zzasdzz"));
        assert!(has_simple_pattern("ewq"));
        assert!(has_simple_pattern("1qaz"));
    }

    #[test]
    fn repeats_and_codepoint_runs_detected() {
        assert!(has_simple_pattern("aaa"));
        assert!(has_simple_pattern("AAAx"));
        assert!(has_simple_pattern("x123x"));
        assert!(has_simple_pattern("cba"));
        assert!(has_simple_pattern("xyz"));
    }

    #[test]
    fn unpatterned_text_is_clean() {
        assert!(!has_simple_pattern("Tr0ub4dor!9"));
        assert!(!has_simple_pattern("correct-Horse1!"));
    }

    #[test]
    fn score_is_clamped_and_ordered() {
        let v = validator();
        assert!(v.score("a") < 30);
        assert!(v.score("Tr0ub4dor!9") > v.score("trouba"));
        assert!(v.score("J8#mKp2&wQz9!fLx4@Ns7$Td") <= 100);
    }

    #[test]
    fn labels_follow_score_bands() {
        let v = validator();
        assert_eq!(v.classify("a"), StrengthLabel::VeryWeak);
        // additive cap is 30 (length) + 40 (classes), so a clean long
        // password tops out in the medium band
        assert_eq!(v.score("J8#mKp2&wQz9!fLx4@Ns7$Td"), 70);
        assert_eq!(v.classify("J8#mKp2&wQz9!fLx4@Ns7$Td"), StrengthLabel::Medium);
    }

    #[test]
    fn generated_passwords_are_valid() {
        let v = validator();
        for _ in 0..20 {
            let p = v.generate(16);
            assert!(v.validate(&p).is_valid, "generated invalid: {p}");
            assert_eq!(p.chars().count(), 16);
        }
    }

    #[test]
    fn interleave_fallback_always_validates() {
        let v = validator();
        let mut rng = rand::rng();
        for len in [8, 12, 16, 24] {
            for _ in 0..20 {
                let p = interleave_classes(&mut rng, len);
                assert!(v.validate(&p).is_valid, "fallback invalid: {p}");
                assert_eq!(p.chars().count(), len);
            }
        }
    }

    #[test]
    fn duplicate_penalty_reduces_score() {
        let v = validator();
        // same length and classes, one with heavy duplication
        let varied = v.score("Km4!xQ9&");
        let duplicated = v.score("Km4!Km4!");
        assert!(duplicated < varied);
    }
}
