/*!
 * # Transaction Pipeline
 *
 * Edits are described, not performed: a [`Transaction`] is an ordered
 * list of [`Step`]s built up front and applied atomically with
 * [`apply_transaction`]. Each step knows how to apply itself to a
 * document, how to invert itself against the document it applies to
 * (undo is inverted steps in reverse order), and how it moves positions
 * around ([`StepMap`], concatenated into a per-transaction [`Mapping`]).
 *
 * Application is all-or-nothing: steps run in order against the
 * in-progress document and the first failure rejects the whole
 * transaction with [`TransactionError::Rejected`], leaving the caller's
 * document untouched.
 */

mod map;
mod step;
mod transaction;

pub use map::{Bias, Mapping, StepMap};
pub use step::{Step, StepError};
pub use transaction::{Applied, Transaction, TransactionError, apply_transaction};
