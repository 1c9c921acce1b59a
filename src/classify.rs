/// The kind of data a field seems to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// An optionally signed run of decimal digits, e.g. `-42`.
    Integer,
    /// An optionally signed decimal number with a single dot, e.g. `3.14`,
    /// `.5` or `7.`.
    Float,
    /// Anything else, including empty fields.
    Text,
}

impl FieldType {
    /// Classify the given field.
    ///
    /// Leading and trailing ASCII whitespace is ignored. No exponent, thousands
    /// separator or special value (`inf`, `NaN`...) is recognized.
    pub fn of(field: &[u8]) -> Self {
        let field = field.trim_ascii();

        let digits = match field.first() {
            Some(b'+' | b'-') => &field[1..],
            _ => field,
        };

        let mut seen_digit = false;
        let mut seen_dot = false;

        for &byte in digits {
            match byte {
                b'0'..=b'9' => seen_digit = true,
                b'.' if !seen_dot => seen_dot = true,
                _ => return Self::Text,
            }
        }

        match (seen_digit, seen_dot) {
            (false, _) => Self::Text,
            (true, false) => Self::Integer,
            (true, true) => Self::Float,
        }
    }
}
