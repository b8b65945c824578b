pub mod assets;
pub mod config;
pub mod convert;
pub mod filesystem;
pub mod frontmatter;
pub mod links;
pub mod pipeline;
pub mod resolver;
