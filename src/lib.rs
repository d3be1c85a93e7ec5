#![allow(async_fn_in_trait)]
pub mod bbox;
pub mod download;
pub mod error;
pub mod m2m;
pub mod pipeline;
pub mod search;
pub mod selection;
