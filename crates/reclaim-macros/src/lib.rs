//! Attribute macro for `reclaim` scenarios.

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    parse::Parser, parse_macro_input, punctuated::Punctuated, spanned::Spanned, Expr, ExprLit,
    ItemFn, Lit, LitStr, Meta, ReturnType,
};

#[derive(Debug, Clone, Copy, Default)]
enum RuntimeFlavor {
    #[default]
    CurrentThread,
    MultiThread,
}

#[derive(Debug)]
enum RuntimeFlavorParseError {
    InvalidVariant(String),
}

impl std::fmt::Display for RuntimeFlavorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVariant(s) => {
                write!(
                    f,
                    "flavor must be \"current_thread\" or \"multi_thread\", got \"{s}\""
                )
            }
        }
    }
}

impl RuntimeFlavor {
    fn from_str(s: &str) -> Result<Self, RuntimeFlavorParseError> {
        match s {
            "current_thread" => Ok(Self::CurrentThread),
            "multi_thread" => Ok(Self::MultiThread),
            s => Err(RuntimeFlavorParseError::InvalidVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct ScenarioConfig {
    flavor: RuntimeFlavor,
    name: Option<LitStr>,
    tick_ms: Option<u64>,
    window_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

fn int_value(nv: &syn::MetaNameValue, what: &str) -> Result<u64, syn::Error> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Int(i), ..
    }) = &nv.value
    {
        i.base10_parse()
    } else {
        Err(syn::Error::new_spanned(
            &nv.value,
            format!("{what} must be an integer literal"),
        ))
    }
}

fn str_value(nv: &syn::MetaNameValue, what: &str) -> Result<LitStr, syn::Error> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Str(s), ..
    }) = &nv.value
    {
        Ok(s.clone())
    } else {
        Err(syn::Error::new_spanned(
            &nv.value,
            format!("{what} must be a string literal"),
        ))
    }
}

impl ScenarioConfig {
    fn from_args(args: &Punctuated<Meta, syn::Token![,]>) -> Result<Self, syn::Error> {
        let mut config = Self::default();

        for arg in args {
            match arg {
                Meta::NameValue(nv) => {
                    let ident = nv
                        .path
                        .get_ident()
                        .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected ident"))?;

                    match ident.to_string().as_str() {
                        "flavor" => {
                            let s = str_value(nv, "flavor")?;
                            config.flavor = RuntimeFlavor::from_str(s.value().as_str())
                                .map_err(|e| syn::Error::new_spanned(&s, e))?;
                        }
                        "name" => config.name = Some(str_value(nv, "name")?),
                        "tick_ms" => config.tick_ms = Some(int_value(nv, "tick_ms")?),
                        "window_ms" => config.window_ms = Some(int_value(nv, "window_ms")?),
                        "timeout_ms" => config.timeout_ms = Some(int_value(nv, "timeout_ms")?),
                        _ => {
                            return Err(syn::Error::new_spanned(
                                ident,
                                format!("unknown attribute: {ident}"),
                            ))
                        }
                    }
                }
                Meta::Path(path) => {
                    return Err(syn::Error::new_spanned(path, "expected key = value"))
                }
                Meta::List(list) => {
                    return Err(syn::Error::new_spanned(list, "expected key = value"))
                }
            }
        }

        Ok(config)
    }

    fn harness_config(&self) -> TokenStream {
        let tick = self
            .tick_ms
            .map(|ms| quote! { .with_tick(::std::time::Duration::from_millis(#ms)) });
        let window = self
            .window_ms
            .map(|ms| quote! { .with_max_window(::std::time::Duration::from_millis(#ms)) });
        let timeout = self
            .timeout_ms
            .map(|ms| quote! { .with_timeout(::std::time::Duration::from_millis(#ms)) });
        quote! {
            ::reclaim::HarnessConfig::default() #tick #window #timeout
        }
    }
}

/// Turns an `async fn(settle: reclaim::Settle) -> reclaim::Result<()>` into a
/// `#[test]` that runs it as a scenario.
///
/// The test builds a tokio runtime, runs the function through
/// `reclaim::run_scenario` and panics with the scenario error on failure.
///
/// Accepted arguments, all optional:
///
/// - `name = "..."`: scenario name (defaults to the function name)
/// - `tick_ms`, `window_ms`, `timeout_ms`: override `HarnessConfig` defaults
/// - `flavor = "current_thread" | "multi_thread"`: runtime flavor
///   (defaults to `current_thread`)
///
/// ```ignore
/// #[reclaim::scenario(timeout_ms = 5000)]
/// async fn cache_is_released(settle: reclaim::Settle) -> reclaim::Result<()> {
///     let expected = settle.expect(["cache"])?;
///     // ...
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn scenario(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let config = match Punctuated::<Meta, syn::Token![,]>::parse_terminated.parse(args) {
        Ok(args) => match ScenarioConfig::from_args(&args) {
            Ok(config) => config,
            Err(err) => return err.into_compile_error().into(),
        },
        Err(err) => return err.into_compile_error().into(),
    };

    if input.sig.asyncness.is_none() {
        return quote_spanned! {
            input.sig.fn_token.span() =>
            compile_error!("the `async` keyword is missing from the function declaration");
        }
        .into();
    }

    if input.sig.inputs.len() != 1 {
        return quote_spanned! {
            input.sig.inputs.span() =>
            compile_error!("functions with #[reclaim::scenario] take exactly one `Settle` argument");
        }
        .into();
    }

    if !input.sig.generics.params.is_empty() {
        return quote_spanned! {
            input.sig.generics.span() =>
            compile_error!("functions with #[reclaim::scenario] cannot be generic");
        }
        .into();
    }

    let ident = &input.sig.ident;
    let vis = &input.vis;
    let attrs = &input.attrs;
    let inputs = &input.sig.inputs;
    let output = &input.sig.output;
    let body = &input.block;

    let name = config
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let harness_config = config.harness_config();

    let runtime_setup = match config.flavor {
        RuntimeFlavor::CurrentThread => quote_spanned! {input.sig.span() =>
            ::reclaim::__private::tokio::runtime::Builder::new_current_thread()
                .enable_all()
        },
        RuntimeFlavor::MultiThread => quote_spanned! {input.sig.span() =>
            ::reclaim::__private::tokio::runtime::Builder::new_multi_thread()
                .enable_all()
        },
    };

    // Bodies without a return type always succeed on their own.
    let entry = match output {
        ReturnType::Default => quote! {
            |settle: ::reclaim::Settle| async move {
                #ident(settle).await;
                ::reclaim::Result::Ok(())
            }
        },
        ReturnType::Type(..) => quote! { #ident },
    };

    let expanded = quote! {
        #[::core::prelude::v1::test]
        #(#attrs)*
        #vis fn #ident() {
            async fn #ident(#inputs) #output #body

            let config = #harness_config;
            let rt = #runtime_setup
                .build()
                .expect("Failed building the Runtime");

            if let ::core::result::Result::Err(error) =
                rt.block_on(::reclaim::run_scenario(#name, config, #entry))
            {
                panic!("scenario `{}` failed: {}", #name, error);
            }
        }
    };

    expanded.into()
}
