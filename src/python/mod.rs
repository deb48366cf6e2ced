mod bindings;

pub use bindings::PyTokenizer;
