//! Field name to column name conventions.

use heck::ToSnakeCase;

/// Maps a declared field name to a column name.
pub type NamingFn = fn(&str) -> String;

/// Default naming convention: `OrganizationID` -> `organization_id`.
pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Leaves field names untouched.
pub fn verbatim(name: &str) -> String {
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversions() {
        let cases = [
            ("ID", "id"),
            ("HELLOTHERE", "hellothere"),
            ("I", "i"),
            ("Hello", "hello"),
            ("HelloThereWorld", "hello_there_world"),
            ("OrganizationID", "organization_id"),
        ];
        for (input, expected) in cases {
            assert_eq!(snake_case(input), expected, "input: {input}");
        }
    }

    #[test]
    fn snake_case_keeps_rust_field_names() {
        assert_eq!(snake_case("organization_id"), "organization_id");
        assert_eq!(snake_case("name"), "name");
    }

    #[test]
    fn verbatim_is_identity() {
        assert_eq!(verbatim("FirstName"), "FirstName");
    }
}
