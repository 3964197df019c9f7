//! Record derive macro implementation

use crate::attrs::parse_field_attrs;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

struct MappedField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    name: String,
    tags: Vec<(String, String)>,
    flatten: bool,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut mapped = Vec::with_capacity(fields.len());
    for field in fields {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        mapped.push(MappedField {
            ident,
            ty: &field.ty,
            name: syn::ext::IdentExt::unraw(ident).to_string(),
            tags: attrs.tags,
            flatten: attrs.flatten,
        });
    }

    let defs = mapped.iter().map(|f| {
        let field_name = &f.name;
        let keys = f.tags.iter().map(|(k, _)| k);
        let values = f.tags.iter().map(|(_, v)| v);
        let tags = quote! { &[#((#keys, #values)),*] };
        if f.flatten {
            let ty = f.ty;
            quote! {
                ::pgload::FieldDef::flatten(#field_name, #tags, <#ty as ::pgload::Record>::fields)
            }
        } else {
            quote! { ::pgload::FieldDef::value(#field_name, #tags) }
        }
    });

    let ref_arms = mapped.iter().enumerate().map(|(idx, f)| {
        let ident = f.ident;
        if f.flatten {
            quote! { #idx => ::core::option::Option::Some(::pgload::FieldRef::Record(&self.#ident)), }
        } else {
            quote! { #idx => ::core::option::Option::Some(::pgload::FieldRef::Value(&self.#ident)), }
        }
    });

    let mut_arms = mapped.iter().enumerate().map(|(idx, f)| {
        let ident = f.ident;
        if f.flatten {
            quote! { #idx => ::core::option::Option::Some(::pgload::FieldMut::Record(&mut self.#ident)), }
        } else {
            quote! { #idx => ::core::option::Option::Some(::pgload::FieldMut::Value(&mut self.#ident)), }
        }
    });

    Ok(quote! {
        impl ::pgload::Record for #name {
            fn fields() -> &'static [::pgload::FieldDef] {
                const FIELDS: &[::pgload::FieldDef] = &[#(#defs),*];
                FIELDS
            }

            #[allow(unused_variables)]
            fn field(&self, index: usize) -> ::core::option::Option<::pgload::FieldRef<'_>> {
                match index {
                    #(#ref_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn field_mut(&mut self, index: usize) -> ::core::option::Option<::pgload::FieldMut<'_>> {
                match index {
                    #(#mut_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::pgload::Scannable for #name {
            fn scan_dest(&mut self) -> ::pgload::ScanDest<'_> {
                ::pgload::ScanDest::Record(self, ::pgload::RecordType::of::<Self>())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn expands_value_and_flatten_fields() {
        let input: DeriveInput = parse_quote! {
            struct User {
                #[tag(db = "user_id", pgload = "omitZero")]
                id: i64,
                r#type: String,
                #[record(skip)]
                cache: Vec<u8>,
                #[record(flatten)]
                audit: Audit,
            }
        };
        let out = expand(input).unwrap().to_string();
        assert!(out.contains("impl :: pgload :: Record for User"));
        assert!(out.contains("impl :: pgload :: Scannable for User"));
        assert!(out.contains(r#"FieldDef :: value ("id" , & [("db" , "user_id") , ("pgload" , "omitZero")])"#));
        assert!(out.contains(r#"FieldDef :: value ("type" , & [])"#));
        assert!(out.contains("FieldDef :: flatten (\"audit\""));
        assert!(!out.contains("cache"));
        assert!(out.contains("2usize => :: core :: option :: Option :: Some (:: pgload :: FieldRef :: Record (& self . audit))"));
    }

    #[test]
    fn rejects_non_structs_and_generics() {
        let input: DeriveInput = parse_quote! {
            enum Status { Active }
        };
        assert!(expand(input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Pair(i32, i32);
        };
        assert!(expand(input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Wrapper<T> { inner: T }
        };
        assert!(expand(input).is_err());
    }
}
