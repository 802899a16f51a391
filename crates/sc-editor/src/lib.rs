pub mod commands;
pub mod input;
pub mod mutation;
pub mod tools;

pub use commands::{Command, CommandStack};
pub use input::{InputEvent, Modifiers};
pub use mutation::{SceneMutation, apply_mutation};
pub use tools::SelectTool;
