//! Kernel components
//!
//! Components are the collaborators the core talks to but does not own.
//! Only the console lives here: the core needs it for diagnostic output.

pub mod console;
