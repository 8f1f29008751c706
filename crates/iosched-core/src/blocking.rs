//! Blocking category of submitted work

use core::fmt;

/// Whether submitted work may run on the submitting thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Blocking {
    /// Always queued; never run by the calling thread
    Never,

    /// May run inline when that is already safe, otherwise queued
    #[default]
    Possibly,

    /// Runs inline; the caller blocks until the work is done
    Always,
}

impl Blocking {
    /// True if the calling thread is allowed to run the work itself
    #[inline]
    pub fn allows_inline(self) -> bool {
        !matches!(self, Blocking::Never)
    }
}

impl fmt::Display for Blocking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Blocking::Never => "never",
            Blocking::Possibly => "possibly",
            Blocking::Always => "always",
        };
        f.write_str(name)
    }
}
