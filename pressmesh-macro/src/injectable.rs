use darling::ast::Data;
use darling::util::Flag;
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, DeriveInput, Generics, Ident, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(inject), supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: Ident,
    generics: Generics,
    data: Data<(), InjectableField>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectableField {
    ident: Option<Ident>,
    ty: Type,
    token: Option<String>,
    default: Flag,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => generate_injectable_impl(&parsed),
        Err(err) => err.write_errors(),
    };
    TokenStream::from(expanded)
}

fn generate_injectable_impl(input: &InjectableInput) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => unreachable!("darling only accepts structs here"),
    };

    let mut tokens = Vec::new();
    let mut initializers = Vec::new();

    for field in &fields.fields {
        let Some(field_name) = &field.ident else {
            continue;
        };

        if field.default.is_present() {
            initializers.push(quote! {
                #field_name: ::core::default::Default::default()
            });
            continue;
        }

        let Some(inner) = arc_inner(&field.ty) else {
            let message = "injected fields must be `Arc<T>`; use #[inject(default)] for anything else";
            initializers.push(quote_spanned! { field.ty.span() =>
                #field_name: compile_error!(#message)
            });
            continue;
        };

        tokens.push(match &field.token {
            Some(name) => quote!(::pressmesh::di::Token::named(#name)),
            None => quote!(::pressmesh::di::Token::of::<#inner>()),
        });

        // Trait providers store `Arc<dyn Trait>` inside the erased instance
        let take = match inner {
            Type::TraitObject(_) => quote!(take_trait),
            _ => quote!(take),
        };
        initializers.push(quote! {
            #field_name: dependencies.#take::<#inner>()?
        });
    }

    let construct = if fields.style.is_unit() {
        quote!(Ok(Self))
    } else {
        quote!(Ok(Self { #(#initializers),* }))
    };

    quote! {
        impl #impl_generics ::pressmesh::di::Injectable for #struct_name #ty_generics #where_clause {
            fn dependencies() -> ::std::vec::Vec<::pressmesh::di::Token> {
                ::std::vec![#(#tokens),*]
            }

            #[allow(unused_variables)]
            fn construct(
                dependencies: &mut ::pressmesh::di::Dependencies
            ) -> ::pressmesh::Result<Self> {
                #construct
            }
        }
    }
}

/// Extract the inner type from `Arc<T>` or `Arc<dyn Trait>`
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
