/// The outcome of a transfer which can move data and still fail.
///
/// A read can hand back data and report that it crossed a filemark in the
/// same call, and a write can land bytes on the medium while warning that
/// the end of the medium is near.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[must_use="this `PartialResult` may contain a `Partial` or `Failure` variant, which should be handled"]
pub enum PartialResult<T, E> {
    Complete(T),
    Partial(T, E),
    Failure(E)
}

use self::PartialResult::*;

impl<T, E> PartialResult<T, E> {
    /// Borrow the error, if there was any.
    pub fn err_ref(&self) -> Option<&E> {
        match self {
            Complete(_) => None,
            Partial(_, error) | Failure(error) => Some(error)
        }
    }

    /// Split into the transferred amount and the condition, either of which
    /// may be absent.
    pub fn both(self) -> (Option<T>, Option<E>) {
        match self {
            Complete(result) => (Some(result), None),
            Partial(result, error) => (Some(result), Some(error)),
            Failure(error) => (None, Some(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PartialResult;
    use super::PartialResult::*;

    #[test]
    fn partial_keeps_both_halves() {
        let res : PartialResult<usize, &str> = Partial(512, "end of media");

        assert_eq!(res.err_ref(), Some(&"end of media"));
        assert_eq!(res.both(), (Some(512), Some("end of media")));
    }

    #[test]
    fn complete_and_failure() {
        let done : PartialResult<usize, &str> = Complete(3);
        let failed : PartialResult<usize, &str> = Failure("no media");

        assert_eq!(done.err_ref(), None);
        assert_eq!(done.both(), (Some(3), None));
        assert_eq!(failed.both(), (None, Some("no media")));
    }
}
