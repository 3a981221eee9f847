//! Procedural macros for tool declarations.
//!
//! `#[tool]` keeps the annotated function untouched and emits a sibling
//! `<name>_tool()` constructor returning a `Callable` whose name, doc string,
//! and parameter descriptors are read from the signature at compile time.

#![warn(missing_docs, clippy::pedantic)]

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    Expr, ExprLit, FnArg, GenericArgument, Ident, ItemFn, Lit, LitStr, Meta, Pat, Path,
    PathArguments, ReturnType, Type, parse_macro_input,
};

/// Derives a `Callable` constructor from a plain or `async` function.
///
/// For `fn say_hello(user: String) -> String` the macro adds
/// `fn say_hello_tool() -> Callable` declaring the tool name `say_hello`,
/// the function's doc comment as its description, and one required
/// `string` parameter named `user`. Arguments are bound by name through
/// `serde`, and the return value is serialized to JSON. A return type named
/// `Result` maps its error into a tool execution failure.
///
/// Options:
///
/// * `name = "..."` overrides the advertised tool name.
/// * `crate = "path"` names the registry crate when it is re-exported,
///   defaulting to `::aitools_registry`.
///
/// Parameters must be owned, plainly named, and non-generic; receivers are
/// rejected.
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = ToolArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(&meta));
    parse_macro_input!(attr with parser);
    let function = parse_macro_input!(item as ItemFn);

    match expand(&args, &function) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ToolArgs {
    name: Option<LitStr>,
    krate: Option<Path>,
}

impl ToolArgs {
    fn parse(&mut self, meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("crate") {
            let path: LitStr = meta.value()?.parse()?;
            self.krate = Some(path.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported tool option, expected `name` or `crate`"))
        }
    }
}

struct Param {
    ident: Ident,
    ty: Type,
    tag: String,
}

fn expand(args: &ToolArgs, function: &ItemFn) -> syn::Result<TokenStream2> {
    let sig = &function.sig;
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "tool functions cannot be generic",
        ));
    }

    let params = sig
        .inputs
        .iter()
        .map(param)
        .collect::<syn::Result<Vec<_>>>()?;

    let krate = args
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::aitools_registry));
    let fn_ident = &sig.ident;
    let tool_ident = format_ident!("{}_tool", fn_ident);
    let vis = &function.vis;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&fn_ident.to_string(), Span::call_site()));

    let idents: Vec<_> = params.iter().map(|p| &p.ident).collect();
    let types: Vec<_> = params.iter().map(|p| &p.ty).collect();
    let keys: Vec<_> = params.iter().map(|p| p.ident.to_string()).collect();
    let tags: Vec<_> = params.iter().map(|p| p.tag.as_str()).collect();

    let bind = quote! {
        #krate::callable::check_arguments(&arguments, #name, &[#(#keys),*]).and_then(|()| {
            Ok::<_, #krate::ToolError>((
                #(#krate::callable::argument::<#types>(&arguments, #name, #keys)?,)*
            ))
        })
    };

    let call = if sig.asyncness.is_some() {
        quote!(#fn_ident(#(#idents),*).await)
    } else {
        quote!(#fn_ident(#(#idents),*))
    };
    let encode = match returned_ident(&sig.output).as_deref() {
        Some("Result") => quote!(#krate::callable::output_result(#call)),
        Some("ToolResult") => quote!(#call.and_then(#krate::callable::output)),
        _ => quote!(#krate::callable::output(#call)),
    };

    let invocation = if sig.asyncness.is_some() {
        quote! {
            #krate::Invocation::deferred(|arguments: #krate::Arguments| -> #krate::ToolFuture {
                let bound = #bind;
                ::std::boxed::Box::pin(async move {
                    match bound {
                        Ok((#(#idents,)*)) => #encode,
                        Err(err) => Err(err),
                    }
                })
            })
        }
    } else {
        quote! {
            #krate::Invocation::immediate(|arguments: #krate::Arguments| {
                let (#(#idents,)*) = #bind?;
                #encode
            })
        }
    };

    let doc = doc_string(function);
    let with_doc = (!doc.is_empty()).then(|| quote!(.with_doc(#doc)));
    let constructor_doc = format!("Tool declaration for [`{fn_ident}`].");

    Ok(quote! {
        #function

        #[doc = #constructor_doc]
        #[must_use]
        #vis fn #tool_ident() -> #krate::Callable {
            #krate::Callable::new(#invocation)
                .named(#name)
                #with_doc
                #(.with_param(#keys, #krate::ParamType::from_rust_type(#tags)))*
        }
    })
}

fn param(input: &FnArg) -> syn::Result<Param> {
    let typed = match input {
        FnArg::Receiver(receiver) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "tool functions cannot take `self`",
            ));
        }
        FnArg::Typed(typed) => typed,
    };

    let Pat::Ident(pat) = typed.pat.as_ref() else {
        return Err(syn::Error::new_spanned(
            &typed.pat,
            "tool parameters must be plain identifiers",
        ));
    };
    if let Type::Reference(reference) = typed.ty.as_ref() {
        return Err(syn::Error::new_spanned(
            reference,
            "tool parameters must be owned values",
        ));
    }

    Ok(Param {
        ident: pat.ident.clone(),
        ty: (*typed.ty).clone(),
        tag: type_tag(&typed.ty),
    })
}

/// Final path segment used for the type table, looking through `Option`.
fn type_tag(ty: &Type) -> String {
    match ty {
        Type::Array(_) | Type::Slice(_) => "Vec".to_owned(),
        Type::Group(group) => type_tag(&group.elem),
        Type::Paren(paren) => type_tag(&paren.elem),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return String::new();
            };
            if segment.ident == "Option" {
                if let Some(inner) = first_type_argument(&segment.arguments) {
                    return type_tag(inner);
                }
            }
            segment.ident.to_string()
        }
        _ => String::new(),
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(bracketed) = arguments else {
        return None;
    };
    bracketed.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn returned_ident(output: &ReturnType) -> Option<String> {
    let ReturnType::Type(_, ty) = output else {
        return None;
    };
    let Type::Path(path) = ty.as_ref() else {
        return None;
    };
    path.path.segments.last().map(|s| s.ident.to_string())
}

fn doc_string(function: &ItemFn) -> String {
    let lines: Vec<String> = function
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(text),
                    ..
                }) => Some(text.value().trim().to_owned()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    lines.join("\n").trim().to_owned()
}
