use std::fmt::{Debug, Display, Formatter};

use super::{Log, Position};

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl<T> Log<T> {
    /// Relative verbosity order of the log level, used to gate `println!` calls.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<TL: Display> Log<TL> {
    /// Trace a successful step (token match, combinator match, opcode dispatch)
    /// at the given source position, gated by this level's verbosity.
    pub fn trace_success<T: Debug>(&self, what: &str, value: &T, position: Position) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Success(()).order() {
            println!("[{}; {}]: {:?} at {}", self, what, value, position);
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (what, value, position);
        }
    }

    /// Trace a failed step at the given source position.
    pub fn trace_failure(&self, what: &str, position: Position) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Result(()).order() {
            println!("[{}; {}Error]: at {}", self, what, position);
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = (what, position);
        }
    }
}
