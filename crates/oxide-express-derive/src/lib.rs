//! Derive macro for typed request binding.
//!
//! This crate provides `#[derive(Bind)]`, which describes the bindable fields
//! of a struct to the `oxide-express` binder.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

/// Scope attribute names, paired with the `Scope` variant they select.
const SCOPES: &[(&str, &str)] = &[
    ("query", "Query"),
    ("header", "Header"),
    ("resp_header", "RespHeader"),
    ("param", "Param"),
    ("cookie", "Cookie"),
    ("form", "Form"),
    ("multipart", "Multipart"),
];

/// Derives `oxide_express::bind::Bind` for a struct with named fields.
///
/// # Field Attributes
///
/// - `#[bind(query = "key")]` - URL query argument
/// - `#[bind(header = "key")]` - request header (key compared ignoring case)
/// - `#[bind(resp_header = "key")]` - header already set on the response
/// - `#[bind(param = "key")]` - path parameter
/// - `#[bind(cookie = "key")]` - request cookie
/// - `#[bind(form = "key")]` - url-encoded form body
/// - `#[bind(multipart = "key")]` - multipart form value
///
/// The key defaults to the field name (`#[bind(query)]`). Fields without a
/// `bind` attribute are left alone.
///
/// - `#[bind(form = "address", nested)]` - the field is a `Bind` struct read
///   from `address.<key>` in the same scope; on a `Vec` field, elements are
///   read from `address.0.<key>` or `address[0].<key>`
/// - `#[bind(unmarshal)]` - the field type implements `CtxUnmarshal` and
///   fills itself from the request context
///
/// The field type decides the decoder: `Vec<T>` collects every value of the
/// key, `Option<T>` wraps the first value, any other type takes the first
/// value. Element and value types implement `TextDecode`.
#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_bind_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_bind_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Bind derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Bind derive only supports structs",
            ));
        }
    };

    let mut registrations: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let Some(attrs) = parse_bind_attrs(&field.attrs, field_name)? else {
            continue;
        };
        registrations.push(field_registration(field_name, &field.ty, &attrs)?);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::oxide_express::bind::Bind for #struct_name #ty_generics #where_clause {
            fn describe(fields: &mut ::oxide_express::bind::FieldSet<Self>) {
                #(#registrations)*
            }
        }
    })
}

struct BindAttrs {
    /// `(Scope variant, key)`.
    scope: Option<(Ident, String)>,
    nested: bool,
    unmarshal: bool,
}

/// Returns `None` for fields without a `bind` attribute.
fn parse_bind_attrs(attrs: &[Attribute], field_name: &Ident) -> syn::Result<Option<BindAttrs>> {
    let mut result: Option<BindAttrs> = None;

    for attr in attrs {
        if !attr.path().is_ident("bind") {
            continue;
        }
        let parsed = result.get_or_insert(BindAttrs {
            scope: None,
            nested: false,
            unmarshal: false,
        });

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("nested") {
                parsed.nested = true;
                return Ok(());
            }
            if meta.path.is_ident("unmarshal") {
                parsed.unmarshal = true;
                return Ok(());
            }

            let Some((_, variant)) = SCOPES.iter().find(|(name, _)| meta.path.is_ident(name))
            else {
                return Err(meta.error("unknown bind attribute"));
            };
            if parsed.scope.is_some() {
                return Err(meta.error("a field binds from at most one scope"));
            }

            let key = if meta.input.peek(syn::Token![=]) {
                let lit: LitStr = meta.value()?.parse()?;
                lit.value()
            } else {
                field_name.to_string()
            };
            if key.is_empty() {
                return Err(meta.error("bind key must not be empty"));
            }
            parsed.scope = Some((Ident::new(variant, meta.path.span()), key));
            Ok(())
        })?;
    }

    Ok(result)
}

fn field_registration(field_name: &Ident, ty: &Type, attrs: &BindAttrs) -> syn::Result<TokenStream2> {
    if attrs.unmarshal {
        let name = field_name.to_string();
        return Ok(quote! {
            fields.unmarshal(#name, |target| &mut target.#field_name);
        });
    }

    let Some((variant, key)) = &attrs.scope else {
        return Err(syn::Error::new_spanned(
            field_name,
            "bind attribute needs a scope such as `query = \"key\"`",
        ));
    };
    let scope = quote!(::oxide_express::bind::Scope::#variant);

    let method = match (wrapper(ty), attrs.nested) {
        (Some("Vec"), true) => quote!(struct_slice),
        (_, true) => quote!(nested),
        (Some("Vec"), false) => quote!(slice),
        (Some("Option"), false) => quote!(optional),
        _ => quote!(scalar),
    };

    Ok(quote! {
        fields.#method(#scope, #key, |target| &mut target.#field_name);
    })
}

/// Returns `Vec` or `Option` when `ty` is one of them with a single type
/// argument.
fn wrapper(ty: &Type) -> Option<&'static str> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 || !matches!(args.args.first(), Some(GenericArgument::Type(_))) {
        return None;
    }

    if segment.ident == "Vec" {
        Some("Vec")
    } else if segment.ident == "Option" {
        Some("Option")
    } else {
        None
    }
}
