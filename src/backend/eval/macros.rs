/// Return early from a function producing `Result<Completion, _>` when a
/// nested evaluation was interrupted by a thrown signal.
macro_rules! try_done {
    ($completion:expr) => {
        if let $crate::backend::eval::Completion::Thrown(signal) = $completion {
            return Ok($crate::backend::eval::Completion::Thrown(signal));
        }
    };
}

/// Same as `try_done!` for native dispatchers returning `Result<Bounce, _>`.
macro_rules! try_bounce {
    ($completion:expr) => {
        if let $crate::backend::eval::Completion::Thrown(signal) = $completion {
            return Ok($crate::backend::natives::Bounce::Thrown(signal));
        }
    };
}
