//! Post-condition checking for structures that carry representation
//! invariants.
//!
//! [`checked`] runs an operation and then verifies the subject's invariants.
//! A violation is an implementation defect, never a caller error, so it
//! panics instead of surfacing through `Result`. Verification runs only when
//! debug assertions are enabled.

/// A structure able to describe the first invariant it violates.
pub trait Invariant {
	/// `None` when every invariant holds.
	fn violation(&self) -> Option<String>;
}

/// Run `body` against `subject`, then verify `subject`'s invariants.
pub fn checked<S, T, F>(subject: &mut S, body: F) -> T
where
	S: Invariant + ?Sized,
	F: FnOnce(&mut S) -> T,
{
	let out = body(subject);
	verify(subject);
	out
}

/// Read-only counterpart of [`checked`].
pub fn checked_ref<S, T, F>(subject: &S, body: F) -> T
where
	S: Invariant + ?Sized,
	F: FnOnce(&S) -> T,
{
	let out = body(subject);
	verify(subject);
	out
}

/// Panic if `subject` violates an invariant (debug builds only).
pub fn verify<S: Invariant + ?Sized>(subject: &S) {
	if cfg!(debug_assertions) {
		if let Some(violation) = subject.violation() {
			panic!("invariant violated: {violation}");
		}
	}
}
