//! RPC handlers, grouped the way the catalogue groups them. Each handler
//! checks its preconditions (see `dispatch`), asserts the advisory locks it
//! needs, mutates, and returns the events to publish after the response.

pub mod camera;
pub mod common;
pub mod execution;
pub mod lock;
pub mod objects;
pub mod project;
pub mod robot;
pub mod scene;
