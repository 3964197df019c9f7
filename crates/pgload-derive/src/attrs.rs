//! Field attribute parsing for the Record derive macro.
//!
//! - `#[tag(key = "value", ...)]`: free-form string tags, read at runtime (`db`, `pgload`...)
//! - `#[record(flatten)]`: promote a nested record's fields into this one
//! - `#[record(skip)]`: leave the field out of the record entirely

use syn::{LitStr, Result};

/// Parsed `#[tag(...)]` contents.
pub(crate) struct TagAttr {
    pub pairs: Vec<(syn::Ident, LitStr)>,
}

impl syn::parse::Parse for TagAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut pairs = Vec::new();

        while !input.is_empty() {
            let key: syn::Ident = input.call(syn::ext::IdentExt::parse_any)?;
            let _: syn::Token![=] = input.parse()?;
            let value: LitStr = input.parse()?;
            pairs.push((key, value));

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        if !input.is_empty() {
            return Err(input.error("expected `key = \"value\"` pairs separated by commas"));
        }

        Ok(TagAttr { pairs })
    }
}

/// Parsed `#[record(...)]` contents.
#[derive(Default)]
pub(crate) struct RecordAttr {
    pub flatten: bool,
    pub skip: bool,
}

impl syn::parse::Parse for RecordAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = RecordAttr::default();

        loop {
            if input.is_empty() {
                break;
            }

            let ident: syn::Ident = input.parse()?;
            match ident.to_string().as_str() {
                "flatten" => attr.flatten = true,
                "skip" => attr.skip = true,
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown record attribute `{other}`, expected `flatten` or `skip`"),
                    ));
                }
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Everything the derive needs to know about one field.
pub(crate) struct FieldAttrs {
    pub tags: Vec<(String, String)>,
    pub flatten: bool,
    pub skip: bool,
}

pub(crate) fn parse_field_attrs(field: &syn::Field) -> Result<FieldAttrs> {
    let mut tags: Vec<(String, String)> = Vec::new();
    let mut flatten = false;
    let mut skip = false;

    for attr in &field.attrs {
        if attr.path().is_ident("tag") {
            let parsed: TagAttr = attr.parse_args()?;
            for (key, value) in parsed.pairs {
                let key_str = syn::ext::IdentExt::unraw(&key).to_string();
                if tags.iter().any(|(k, _)| *k == key_str) {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("duplicate tag `{key_str}`"),
                    ));
                }
                tags.push((key_str, value.value()));
            }
        } else if attr.path().is_ident("record") {
            let parsed: RecordAttr = attr.parse_args()?;
            flatten |= parsed.flatten;
            skip |= parsed.skip;
        }
    }

    if flatten && skip {
        return Err(syn::Error::new_spanned(
            field,
            "a field cannot be both `flatten` and `skip`",
        ));
    }

    Ok(FieldAttrs {
        tags,
        flatten,
        skip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn field(f: syn::FieldsNamed) -> syn::Field {
        f.named.into_iter().next().unwrap()
    }

    #[test]
    fn parses_tags_in_order() {
        let f = field(parse_quote!({
            #[tag(db = "user_name", pgload = "omitZero,nullZero")]
            name: String
        }));
        let attrs = parse_field_attrs(&f).unwrap();
        assert_eq!(
            attrs.tags,
            vec![
                ("db".to_string(), "user_name".to_string()),
                ("pgload".to_string(), "omitZero,nullZero".to_string()),
            ]
        );
        assert!(!attrs.flatten);
        assert!(!attrs.skip);
    }

    #[test]
    fn tags_merge_across_attributes_and_accept_keywords() {
        let f = field(parse_quote!({
            #[tag(db = "kind")]
            #[tag(r#type = "x", fn = "y")]
            kind: String
        }));
        let attrs = parse_field_attrs(&f).unwrap();
        let keys: Vec<_> = attrs.tags.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["db", "type", "fn"]);
    }

    #[test]
    fn duplicate_tag_is_an_error() {
        let f = field(parse_quote!({
            #[tag(db = "a")]
            #[tag(db = "b")]
            a: String
        }));
        assert!(parse_field_attrs(&f).is_err());
    }

    #[test]
    fn record_flags() {
        let f = field(parse_quote!({
            #[record(flatten)]
            audit: Audit
        }));
        assert!(parse_field_attrs(&f).unwrap().flatten);

        let f = field(parse_quote!({
            #[record(skip)]
            cache: Vec<u8>
        }));
        assert!(parse_field_attrs(&f).unwrap().skip);

        let f = field(parse_quote!({
            #[record(flatten, skip)]
            audit: Audit
        }));
        assert!(parse_field_attrs(&f).is_err());

        let f = field(parse_quote!({
            #[record(bogus)]
            audit: Audit
        }));
        assert!(parse_field_attrs(&f).is_err());
    }

    #[test]
    fn malformed_tag_is_an_error() {
        let f = field(parse_quote!({
            #[tag(db)]
            a: String
        }));
        assert!(parse_field_attrs(&f).is_err());
    }
}
