//! Code generation for the `Codes` derive.

use proc_macro2::TokenStream;
use quote::quote;

use crate::validation::CodesStructure;

/// Generate the inherent constants and the `Code` impl.
pub fn generate(codes: &CodesStructure) -> TokenStream {
    let inherent = render_inherent(codes);
    let code_impl = render_code_impl(codes);
    let conversions = render_conversions(codes);

    quote! {
        #inherent
        #code_impl
        #conversions
    }
}

fn render_inherent(codes: &CodesStructure) -> TokenStream {
    let name = &codes.name;
    let first = codes.first.tokens();
    let count_u32 = codes.variants.len() as u32;
    let variants: Vec<_> = codes.variants.iter().map(|v| &v.name).collect();
    let offsets: Vec<u32> = (0..count_u32).collect();

    quote! {
        impl #name {
            /// Code of the first variant.
            pub const FIRST_CODE: u32 = #first;
            /// First code after this namespace.
            pub const NEXT_CODE: u32 = Self::FIRST_CODE + #count_u32;
            /// Every variant, in code order.
            pub const ALL: &'static [Self] = &[#(Self::#variants),*];

            /// The variant with `code`, if it belongs to this namespace.
            pub const fn from_code(code: u32) -> ::core::option::Option<Self> {
                match code.checked_sub(Self::FIRST_CODE) {
                    #(::core::option::Option::Some(#offsets) => ::core::option::Option::Some(Self::#variants),)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    }
}

fn render_code_impl(codes: &CodesStructure) -> TokenStream {
    let name = &codes.name;
    let label_arms = codes.variants.iter().map(|v| {
        let variant = &v.name;
        let label = &v.label;
        quote! { Self::#variant => ::core::option::Option::Some(#label), }
    });

    quote! {
        impl ::tokio_hfsm::Code for #name {
            fn code(self) -> u32 {
                Self::FIRST_CODE + self as u32
            }

            fn label(self) -> ::core::option::Option<&'static str> {
                match self {
                    #(#label_arms)*
                }
            }
        }
    }
}

fn render_conversions(codes: &CodesStructure) -> TokenStream {
    let name = &codes.name;

    quote! {
        impl ::core::convert::From<#name> for u32 {
            fn from(value: #name) -> u32 {
                ::tokio_hfsm::Code::code(value)
            }
        }
    }
}
