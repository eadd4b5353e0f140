pub mod chart;
pub mod connection;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod sql;

pub use chart::*;
pub use connection::*;
pub use pipeline::*;
pub use process::*;
pub use schema::*;
pub use sql::*;
