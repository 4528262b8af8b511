//! Proc macros for structured oracle output.
//!
//! `#[derive(Tool)]` turns a struct into a Claude tool definition whose
//! input schema mirrors the struct's fields. `#[derive(Schema)]` generates
//! only the schema, for structs nested inside a tool's fields.
//!
//! # Example
//!
//! ```ignore
//! /// Write the next scene of the story
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "write_scene")]
//! struct WriteScene {
//!     /// Prose for the scene
//!     narrative: String,
//!     /// Atmosphere of the scene
//!     #[tool(one_of = "calm, stormy, ethereal, glitch")]
//!     mood: String,
//!     /// Choices offered to the reader
//!     choices: Vec<ChoiceDraft>,
//!     #[tool(optional)]
//!     ending_type: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, DeriveInput, Field, Lit, LitStr, Meta, Token, Type};

/// Derive a Claude tool definition.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` - Override the tool name (defaults to snake_case struct name)
/// - `#[tool(optional)]` on fields - Leave the field out of `required`
/// - `#[tool(rename = "...")]` on fields - Override field name in schema
/// - `#[tool(one_of = "a, b, c")]` on fields - Restrict a string field to the listed values
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input, true)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Derive only `input_schema()`, for types nested in a tool's fields.
#[proc_macro_derive(Schema, attributes(tool))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input, false)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[derive(Default)]
struct FieldAttrs {
    optional: bool,
    rename: Option<String>,
    one_of: Vec<String>,
}

fn expand(input: DeriveInput, as_tool: bool) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "only structs with named fields are supported",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(&input, "only structs are supported")),
    };

    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let attrs = field_attrs(field)?;
        let field_name = match &attrs.rename {
            Some(name) => name.clone(),
            None => field_ident(field)?.to_string(),
        };
        let field_desc = get_doc_comment(&field.attrs);

        let type_schema = if attrs.one_of.is_empty() {
            type_to_schema(&field.ty)
        } else {
            let values = &attrs.one_of;
            quote! { serde_json::json!({"type": "string", "enum": [#(#values),*]}) }
        };

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name.to_string(), property);
            }
        });

        if !attrs.optional && !is_option_type(&field.ty) {
            required_fields.push(field_name);
        }
    }

    let schema_fn = quote! {
        /// JSON schema for this type.
        pub fn input_schema() -> serde_json::Value {
            let mut properties = serde_json::Map::new();
            #(#property_tokens)*

            let required: Vec<&str> = vec![#(#required_fields),*];

            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required
            })
        }
    };

    if !as_tool {
        return Ok(quote! {
            impl #struct_name {
                #schema_fn
            }
        });
    }

    let tool_name = get_tool_name(&input)?;

    Ok(quote! {
        impl #struct_name {
            /// Get the tool name.
            pub fn tool_name() -> &'static str {
                #tool_name
            }

            /// Get the tool description.
            pub fn tool_description() -> &'static str {
                #description
            }

            #schema_fn

            /// Create a Tool definition for use with the Claude API.
            pub fn as_tool() -> claude::Tool {
                claude::Tool {
                    name: Self::tool_name().to_string(),
                    description: Self::tool_description().to_string(),
                    input_schema: Self::input_schema(),
                }
            }
        }
    })
}

fn field_ident(field: &Field) -> syn::Result<&syn::Ident> {
    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

fn get_tool_name(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("tool") {
            continue;
        }
        let mut name = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported tool attribute"))
            }
        })?;
        if let Some(name) = name {
            return Ok(name);
        }
    }

    Ok(to_snake_case(&input.ident.to_string()))
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("tool") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                attrs.optional = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.rename = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("one_of") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.one_of = value
                    .value()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if attrs.one_of.is_empty() {
                    return Err(meta.error("one_of needs at least one value"));
                }
                Ok(())
            } else {
                Err(meta.error("unsupported tool attribute"))
            }
        })?;
    }
    Ok(attrs)
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Path(type_path)
            if type_path.path.segments.last().is_some_and(|s| s.ident == "Option")
    )
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        let args: &Punctuated<syn::GenericArgument, Token![,]> = &args.args;
        if let Some(syn::GenericArgument::Type(inner)) = args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Type::Path(type_path) = ty else {
        return quote! { serde_json::json!({}) };
    };
    let Some(segment) = type_path.path.segments.last() else {
        return quote! { serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => match first_generic(segment) {
            Some(inner) => type_to_schema(inner),
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner);
                quote! {
                    serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        // Anything else is expected to derive `Schema` itself.
        _ => quote! { <#ty>::input_schema() },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
