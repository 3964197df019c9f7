//! Field directive parsing.
//!
//! Directives live in a comma-separated tag (key `pgload` by default):
//!
//! - `omit`: never write the field
//! - `omitZero`: skip the field when it holds its zero value
//! - `defaultZero`: write `DEFAULT` when the field holds its zero value
//! - `nullZero`: write `NULL` when the field holds its zero value

/// Per-field write policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagOptions {
    pub omit: bool,
    pub omit_zero: bool,
    pub default_zero: bool,
    pub null_zero: bool,
}

impl TagOptions {
    /// Parse a directive string. Unknown tokens are ignored; repeated tokens compose by OR.
    pub fn parse(directives: &str) -> Self {
        let mut options = Self::default();
        for token in directives.split(',').map(str::trim) {
            match token {
                "omit" => options.omit = true,
                "omitZero" => options.omit_zero = true,
                "defaultZero" => options.default_zero = true,
                "nullZero" => options.null_zero = true,
                _ => {}
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directives() {
        assert_eq!(TagOptions::parse(""), TagOptions::default());
    }

    #[test]
    fn single_directives() {
        assert!(TagOptions::parse("omit").omit);
        assert!(TagOptions::parse("omitZero").omit_zero);
        assert!(TagOptions::parse("defaultZero").default_zero);
        assert!(TagOptions::parse("nullZero").null_zero);
    }

    #[test]
    fn combined_directives_are_trimmed() {
        let options = TagOptions::parse(" omitZero , nullZero,bogus ");
        assert_eq!(
            options,
            TagOptions {
                omit: false,
                omit_zero: true,
                default_zero: false,
                null_zero: true,
            }
        );
    }

    #[test]
    fn case_sensitive_tokens() {
        assert_eq!(TagOptions::parse("OMIT,nullzero"), TagOptions::default());
    }
}
