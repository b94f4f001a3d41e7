//! Name ownership flags, reply codes and error names
//!
//! Flag bits and reply codes are the daemon's; error names are what peers
//! match on.
