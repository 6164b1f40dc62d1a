//! Derive macro for tokio-hfsm code namespaces.

use darling::FromDeriveInput;
use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod codegen;
mod validation;

/// Assigns consecutive `u32` codes to the variants of a fieldless enum and
/// implements `tokio_hfsm::Code` for it.
///
/// Codes start at `#[codes(base = N)]` (default 0), or right after another
/// namespace with `#[codes(after = Other)]`, so per-machine events can
/// continue from `SmEvent` without colliding:
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
/// #[codes(after = SmEvent)]
/// enum LoginEvent {
///     Submit,     // SmEvent::NEXT_CODE
///     Retry,      // SmEvent::NEXT_CODE + 1
/// }
/// ```
///
/// A variant's label defaults to its name and can be overridden with
/// `#[codes(label = "...")]`.
#[proc_macro_derive(Codes, attributes(codes))]
pub fn derive_codes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match attrs::CodesArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    match validation::CodesStructure::parse(args) {
        Ok(structure) => codegen::generate(&structure).into(),
        Err(e) => e.write_errors().into(),
    }
}
