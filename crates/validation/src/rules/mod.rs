mod conflicting_stream_directives;
mod known_directives;

pub use conflicting_stream_directives::ConflictingStreamDirectives;
pub use known_directives::KnownDirectives;
