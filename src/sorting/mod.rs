mod dfs;
pub(crate) mod error;
pub(crate) mod groups;
pub(crate) mod plugins;
mod validate;
pub(crate) mod vertex;
