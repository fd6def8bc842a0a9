use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, PatType, ReturnType, Type};

fn unsupported_arg_error(arg: &FnArg, fn_name: &str) -> syn::Error {
    syn::Error::new(
        arg.span(),
        format!("builtin `{}` may only take `name: f64` arguments", fn_name),
    )
}

fn is_f64(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "f64")
            .unwrap_or(false),
        _ => false,
    }
}

/// Turns `fn name(a: f64, b: f64) -> f64 { .. }` into a whitelist entry
/// `pub fn name(args: &[f64]) -> Result<f64, EvalError>` that checks the
/// argument count before binding the positional arguments.
#[proc_macro_attribute]
pub fn builtin_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let fn_name = &input.sig.ident;
    let fn_args = &input.sig.inputs;
    let fn_body = &input.block;
    let fn_attrs = &input.attrs;

    match &input.sig.output {
        ReturnType::Type(_, ty) if is_f64(ty) => {}
        output => {
            return syn::Error::new(
                output.span(),
                format!("builtin `{}` must return f64", fn_name),
            )
            .to_compile_error()
            .into();
        }
    }

    let mut arg_extractions = Vec::new();

    for (i, arg) in fn_args.iter().enumerate() {
        let FnArg::Typed(PatType { pat, ty, .. }) = arg else {
            return unsupported_arg_error(arg, &fn_name.to_string())
                .to_compile_error()
                .into();
        };
        let syn::Pat::Ident(ref ident) = **pat else {
            return unsupported_arg_error(arg, &fn_name.to_string())
                .to_compile_error()
                .into();
        };
        if !is_f64(ty) {
            return unsupported_arg_error(arg, &fn_name.to_string())
                .to_compile_error()
                .into();
        }

        let arg_name = &ident.ident;
        arg_extractions.push(quote! {
            let #arg_name: f64 = args[#i];
        });
    }

    let args_len = arg_extractions.len();
    let name_str = fn_name.to_string();
    let expanded = quote! {
        #(#fn_attrs)*
        pub fn #fn_name(args: &[f64]) -> ::std::result::Result<f64, crate::ast::EvalError> {
            if args.len() != #args_len {
                return Err(crate::ast::EvalError::ArityMismatch {
                    function: #name_str.to_string(),
                    expected: crate::ast::Arity::Exact(#args_len),
                    got: args.len(),
                });
            }

            #(#arg_extractions)*

            let result: f64 = #fn_body;
            Ok(result)
        }
    };

    TokenStream::from(expanded)
}
