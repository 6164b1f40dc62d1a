//! Checks on the annotated enum before anything is generated.

use darling::{Error, Result};
use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;

use crate::attrs::CodesArgs;

/// Where the first code of the namespace comes from.
#[derive(Debug)]
pub enum First {
    Base(u32),
    After(syn::Path),
}

impl First {
    pub fn tokens(&self) -> TokenStream {
        match self {
            Self::Base(base) => quote! { #base },
            Self::After(path) => quote! { <#path>::NEXT_CODE },
        }
    }
}

#[derive(Debug)]
pub struct Variant {
    pub name: Ident,
    pub label: String,
}

/// The enum after validation.
#[derive(Debug)]
pub struct CodesStructure {
    pub name: Ident,
    pub first: First,
    pub variants: Vec<Variant>,
}

impl CodesStructure {
    /// Validates the parsed attributes. All problems are reported together.
    pub fn parse(args: CodesArgs) -> Result<Self> {
        let mut errors = Error::accumulator();

        if !args.generics.params.is_empty() {
            errors.push(
                Error::custom("Codes cannot be derived for generic enums")
                    .with_span(&args.generics),
            );
        }

        let first = match (args.base, args.after) {
            (Some(_), Some(after)) => {
                errors.push(
                    Error::custom("`base` and `after` are mutually exclusive").with_span(&after),
                );
                First::Base(0)
            }
            (Some(base), None) => First::Base(base),
            (None, Some(after)) => First::After(after),
            (None, None) => First::Base(0),
        };

        // `supports(enum_unit)` already refused structs and unions.
        let variants = args.data.take_enum().unwrap_or_default();

        if variants.is_empty() {
            errors.push(
                Error::custom("Codes needs at least one variant").with_span(&args.ident),
            );
        }

        let mut out = Vec::with_capacity(variants.len());
        for variant in variants {
            if let Some(discriminant) = &variant.discriminant {
                errors.push(
                    Error::custom("codes are assigned in declaration order; remove the explicit discriminant")
                        .with_span(discriminant),
                );
            }
            let label = variant
                .label
                .unwrap_or_else(|| variant.ident.to_string());
            out.push(Variant {
                name: variant.ident,
                label,
            });
        }

        if let First::Base(base) = first {
            let count = u32::try_from(out.len()).unwrap_or(u32::MAX);
            if base.checked_add(count).is_none() {
                errors.push(
                    Error::custom("codes overflow u32 starting from this base")
                        .with_span(&args.ident),
                );
            }
        }

        errors.finish_with(Self {
            name: args.ident,
            first,
            variants: out,
        })
    }
}
