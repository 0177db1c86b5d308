//! Built-in example phases.

pub mod add;
mod stop_words;
pub mod word_count;

pub use add::AddPhase;
pub use word_count::WordCountPhase;

use crate::phase::PhaseRegistration;

/// Phases every [`crate::phase::PhaseRegistry::builtin`] registry starts with.
pub(crate) const BUILTIN: &[PhaseRegistration] = &[
    PhaseRegistration::new(add::NAME, add::build),
    PhaseRegistration::new(word_count::NAME, word_count::build),
];
