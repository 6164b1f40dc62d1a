//! Attribute parsing for the `Codes` derive.

use darling::ast::Data;
use darling::{FromDeriveInput, FromVariant};
use syn::{Expr, Generics, Ident, Path};

/// Arguments for `#[codes(...)]` on the enum.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(codes), supports(enum_unit))]
pub struct CodesArgs {
    pub ident: Ident,
    pub generics: Generics,
    pub data: Data<CodeVariant, ()>,

    /// First code of the namespace.
    #[darling(default)]
    pub base: Option<u32>,

    /// Start where another namespace's codes end.
    #[darling(default)]
    pub after: Option<Path>,
}

/// A single variant, with an optional `#[codes(label = "...")]`.
#[derive(Debug, FromVariant)]
#[darling(attributes(codes))]
pub struct CodeVariant {
    pub ident: Ident,
    pub discriminant: Option<Expr>,

    #[darling(default)]
    pub label: Option<String>,
}
