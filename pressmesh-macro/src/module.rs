use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, Attribute, Expr, ExprLit, ExprPath, Ident,
    ItemStruct, Lit, LitBool, Token, Type,
};

/// One entry of a module list: a type shorthand, a string token or any
/// other expression.
enum ModuleItem {
    Type { attrs: Vec<Attribute>, ty: Type },
    Named { attrs: Vec<Attribute>, name: syn::LitStr },
    Expr { attrs: Vec<Attribute>, expr: Expr },
}

impl Parse for ModuleItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        if input.peek(Token![dyn]) {
            let ty = input.parse()?;
            return Ok(ModuleItem::Type { attrs, ty });
        }

        let expr: Expr = input.parse()?;
        Ok(match expr {
            Expr::Path(ExprPath { qself: None, path, .. }) => ModuleItem::Type {
                attrs,
                ty: Type::Path(syn::TypePath { qself: None, path }),
            },
            Expr::Lit(ExprLit { lit: Lit::Str(name), .. }) => ModuleItem::Named { attrs, name },
            expr => ModuleItem::Expr { attrs, expr },
        })
    }
}

#[derive(Default)]
struct ModuleArgs {
    imports: Vec<ModuleItem>,
    providers: Vec<ModuleItem>,
    controllers: Vec<ModuleItem>,
    entities: Vec<ModuleItem>,
    exports: Vec<ModuleItem>,
    global: bool,
    lifecycle: bool,
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = ModuleArgs::default();

        while !input.is_empty() {
            let name: Ident = input.parse()?;

            if name == "global" || name == "lifecycle" {
                let value = if input.peek(Token![=]) {
                    input.parse::<Token![=]>()?;
                    input.parse::<LitBool>()?.value
                } else {
                    true
                };
                if name == "global" {
                    args.global = value;
                } else {
                    args.lifecycle = value;
                }
            } else {
                input.parse::<Token![=]>()?;

                // Parse array: [Item1, Item2, ...]
                let content;
                syn::bracketed!(content in input);
                let items: Vec<ModuleItem> = content
                    .parse_terminated(ModuleItem::parse, Token![,])?
                    .into_iter()
                    .collect();

                match name.to_string().as_str() {
                    "imports" => args.imports = items,
                    "providers" => args.providers = items,
                    "controllers" => args.controllers = items,
                    "entities" => args.entities = items,
                    "exports" => args.exports = items,
                    other => {
                        return Err(syn::Error::new(
                            name.span(),
                            format!("unknown module key `{other}`"),
                        ));
                    }
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(args)
    }
}

pub fn module_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ModuleArgs);
    let input = parse_macro_input!(item as ItemStruct);
    let expanded = generate_module_impl(&args, &input);

    TokenStream::from(expanded)
}

/// Expand list entries, mapping bare types through `shorthand`.
fn entries(
    items: &[ModuleItem],
    method: &str,
    shorthand: impl Fn(&Type) -> TokenStream2,
    named: impl Fn(&syn::LitStr) -> syn::Result<TokenStream2>,
) -> TokenStream2 {
    let method = Ident::new(method, proc_macro2::Span::call_site());
    let calls = items.iter().map(|item| {
        let (attrs, value) = match item {
            ModuleItem::Type { attrs, ty } => (attrs, shorthand(ty)),
            ModuleItem::Named { attrs, name } => {
                (attrs, named(name).unwrap_or_else(syn::Error::into_compile_error))
            }
            ModuleItem::Expr { attrs, expr } => (attrs, quote!(#expr)),
        };
        quote! {
            #(#attrs)*
            let metadata = metadata.#method(#value);
        }
    });
    quote!(#(#calls)*)
}

fn generate_module_impl(args: &ModuleArgs, input: &ItemStruct) -> TokenStream2 {
    let module_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let not_a_token = |key: &'static str| {
        move |name: &syn::LitStr| -> syn::Result<TokenStream2> {
            Err(syn::Error::new(name.span(), format!("string tokens are only allowed in `exports`, not `{key}`")))
        }
    };

    let imports = entries(
        &args.imports,
        "import",
        |ty| quote!(::pressmesh::module::ModuleRef::of::<#ty>()),
        not_a_token("imports"),
    );
    let providers = entries(
        &args.providers,
        "provider",
        |ty| quote!(::pressmesh::di::Provider::class::<#ty>()),
        not_a_token("providers"),
    );
    let controllers = entries(
        &args.controllers,
        "controller",
        |ty| quote!(::pressmesh::controller::ControllerRef::of::<#ty>()),
        not_a_token("controllers"),
    );
    let entities = entries(
        &args.entities,
        "entity",
        |ty| quote!(::pressmesh::module::EntityRef::of::<#ty>()),
        not_a_token("entities"),
    );
    let exports = entries(
        &args.exports,
        "export",
        |ty| quote!(::pressmesh::di::Token::of::<#ty>()),
        |name| Ok(quote!(::pressmesh::di::Token::named(#name))),
    );

    let global = args.global;
    let lifecycle = args.lifecycle.then(|| {
        quote! {
            fn lifecycle(&self) -> ::core::option::Option<&dyn ::pressmesh::lifecycle::ModuleLifecycle> {
                ::core::option::Option::Some(self)
            }
        }
    });

    quote! {
        #input

        impl #impl_generics ::pressmesh::module::Module for #module_name #ty_generics #where_clause {
            fn metadata(&self) -> ::pressmesh::module::ModuleMetadata {
                let metadata = ::pressmesh::module::ModuleMetadata::new().global(#global);
                #imports
                #providers
                #controllers
                #entities
                #exports
                metadata
            }

            #lifecycle
        }
    }
}
