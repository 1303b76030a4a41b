use proc_macro::TokenStream;

mod injectable;
mod module;

/// Derive macro for making a struct constructible by the DI container
///
/// Every `Arc<T>` field becomes a constructor dependency on `T`'s type token
/// (`Arc<dyn Trait>` on the trait's token). Fields can opt out or pick a
/// string token with `#[inject(..)]`.
///
/// # Example
/// ```rust,ignore
/// use pressmesh::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct PostService {
///     repository: Arc<dyn PostRepository>,
///     #[inject(token = "config.page_size")]
///     page_size: Arc<usize>,
///     #[inject(default)]
///     cache: Mutex<HashMap<i64, Post>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro for declaring a module's composition
///
/// Bare paths are shorthand: an import becomes `ModuleRef::of::<P>()`, a
/// provider `Provider::class::<P>()`, a controller `ControllerRef::of::<P>()`,
/// an entity `EntityRef::of::<P>()` and an export `Token::of::<P>()`. String
/// literals in `exports` are named tokens. Any other expression is used as
/// written.
///
/// # Example
/// ```rust,ignore
/// use pressmesh::prelude::*;
///
/// #[module(
///     imports = [DatabaseModule::for_root("sqlite::memory:")],
///     controllers = [PostController],
///     providers = [
///         PostService,
///         Provider::provide("config.page_size").use_value(20_usize),
///     ],
///     entities = [Post],
///     exports = [PostService, "config.page_size"],
///     lifecycle,
/// )]
/// #[derive(Default)]
/// pub struct PostModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}
