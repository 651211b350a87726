pub mod autocomplete;
pub mod config;
pub mod figures;
pub mod gateway;
pub mod grouping;
pub mod links;
pub mod markup;
pub mod model;
pub mod reference;
pub mod request;
pub mod runtime;
pub mod store;
pub mod table;
