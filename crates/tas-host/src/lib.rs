pub mod commands;
pub mod events;
pub mod runtime;

pub use commands::EditorCommand;
pub use events::EditorEvent;
pub use runtime::SessionRuntime;
