use std::fmt::{Display, Formatter};

/// How many instances of a service the container may create.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Lifetime {
    /// One instance for the life of the injector. Created on first request.
    Singleton,

    /// One instance per [`Scope`](crate::Scope). Created on the first request
    /// within that scope and torn down when the scope ends.
    Scoped,

    /// A new instance for every request. Never cached.
    Transient,
}

impl Lifetime {
    /// Whether instances with this lifetime are cached by the container.
    #[must_use]
    pub fn is_cached(self) -> bool {
        match self {
            Lifetime::Singleton | Lifetime::Scoped => true,
            Lifetime::Transient => false,
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "singleton"),
            Lifetime::Scoped => write!(f, "scoped"),
            Lifetime::Transient => write!(f, "transient"),
        }
    }
}
