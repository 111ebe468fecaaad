extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn};

/// Wraps an async method in a MongoDB transaction: starts it on the
/// `session` argument, commits on `Ok`, aborts on `Err`. The body moves
/// to a hidden inner method so the public signature stays unchanged.
#[proc_macro_attribute]
pub fn tx(_args: TokenStream, input: TokenStream) -> TokenStream {
    let func = parse_macro_input!(input as ItemFn);
    let vis = &func.vis;
    let body = &func.block;
    let name = &func.sig.ident;
    let args = &func.sig.inputs;
    let ret = &func.sig.output;

    let mut forward = Vec::new();
    for arg in args {
        match arg {
            FnArg::Receiver(_) => forward.push(quote!(self)),
            FnArg::Typed(pat) => {
                let pat = &pat.pat;
                forward.push(quote!(#pat));
            }
        }
    }

    let inner = quote::format_ident!("{}_tx_body", name);
    let expanded = quote! {
        #vis async fn #inner(#args) #ret {
            #body
        }

        #vis async fn #name(#args) #ret {
            session.start_transaction().await?;
            match Self::#inner(#(#forward),*).await {
                Ok(value) => {
                    session.commit_transaction().await?;
                    Ok(value)
                }
                Err(err) => {
                    session.abort_transaction().await?;
                    Err(err)
                }
            }
        }
    };

    TokenStream::from(expanded)
}
