// # Native Adapter Implementations
//
// In-process implementations of the NativeAdapter trait.

pub mod editor;

pub use editor::{EditorAdapter, OutboundCall};
