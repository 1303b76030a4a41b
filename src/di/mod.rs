mod builder;
mod container;
mod injectable;
mod provided;
mod provider;
mod resolver;
mod token;

pub use builder::ContainerBuilder;
pub use container::{Container, FactoryFn, Instance};
pub use injectable::{Dependencies, Injectable};
pub use provided::Provided;
pub use provider::{ClassProvider, FactoryProvider, Provider, ProviderDefinition, Scope, Strategy};
pub use resolver::DependencyResolver;
pub use token::Token;
