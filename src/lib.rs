pub mod compare;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod schema;
